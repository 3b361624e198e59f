use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::AccessRequest;
use crate::db::{access_requests as queries, listings};
use crate::domain::access::access_expiry;
use crate::domain::{AccessRequestStatus, AccessRequestType, Actor};
use crate::error::AppError;
use crate::services::notifications::{Notification, NotificationDispatcher};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccessRequest {
    /// Must be the caller unless the caller is an admin. Defaults to the caller.
    pub buyer_id: Option<Uuid>,
    #[serde(alias = "listingId")]
    pub note_listing_id: Uuid,
    pub request_type: AccessRequestType,
    /// Accepted for client compatibility and ignored; the window is always
    /// measured from the server clock.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAccessRequest {
    pub status: AccessRequestStatus,
}

/// Time-boxed grants of contact and document visibility. At most one active
/// request exists per (buyer, listing) pair.
#[derive(Clone)]
pub struct AccessGate {
    pool: PgPool,
    notifier: NotificationDispatcher,
    ttl_hours: i64,
}

impl AccessGate {
    pub fn new(pool: PgPool, notifier: NotificationDispatcher, ttl_hours: i64) -> Self {
        Self {
            pool,
            notifier,
            ttl_hours,
        }
    }

    /// Opens a request. Stale pending rows for the pair are expired first, in
    /// the same database transaction; a still-active one makes this a
    /// Conflict. Concurrent callers are serialized by the partial unique
    /// index, and the loser's unique violation surfaces as a Conflict too.
    pub async fn request(
        &self,
        actor: &Actor,
        input: CreateAccessRequest,
    ) -> Result<AccessRequest, AppError> {
        let buyer_id = input.buyer_id.unwrap_or(actor.user_id);
        if !actor.is_or_admin(buyer_id) {
            return Err(AppError::Forbidden("Cannot request access for another user".to_string()));
        }

        let mut tx = self.pool.begin().await?;

        let listing = listings::get_listing(&mut *tx, input.note_listing_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Listing {} not found", input.note_listing_id))
            })?;
        if listing.seller_id == buyer_id {
            return Err(AppError::Forbidden(
                "Sellers cannot request access to their own listing".to_string(),
            ));
        }

        queries::expire_stale_for_pair(&mut *tx, buyer_id, listing.id).await?;

        let now = Utc::now();
        let request = AccessRequest {
            id: Uuid::new_v4(),
            buyer_id,
            listing_id: listing.id,
            request_type: input.request_type,
            status: AccessRequestStatus::Pending,
            expires_at: access_expiry(now, self.ttl_hours),
            created_at: now,
            updated_at: now,
        };
        let saved = queries::insert_access_request(&mut *tx, &request)
            .await
            .map_err(|err| match AppError::from(err) {
                AppError::Conflict(_) => AppError::Conflict(
                    "An active access request already exists for this listing".to_string(),
                ),
                other => other,
            })?;
        tx.commit().await?;

        tracing::info!(
            request_id = %saved.id,
            listing_id = %listing.id,
            buyer_id = %buyer_id,
            "Access requested"
        );
        self.notifier.dispatch(Notification::AccessRequested {
            recipient: listing.seller_id,
            listing_id: listing.id,
            request_id: saved.id,
        });
        Ok(saved)
    }

    /// Requests the caller made or received. Expires stale pending requests
    /// before reading, so a status may change under the caller.
    pub async fn list(&self, actor: &Actor) -> Result<Vec<AccessRequest>, AppError> {
        self.expire_stale().await?;
        let scope = if actor.is_admin { None } else { Some(actor.user_id) };
        Ok(queries::list_visible_to(&self.pool, scope).await?)
    }

    /// Seller's (or an admin's) decision on a pending, unexpired request.
    pub async fn review(
        &self,
        actor: &Actor,
        id: Uuid,
        status: AccessRequestStatus,
    ) -> Result<AccessRequest, AppError> {
        if !status.is_review_outcome() {
            return Err(AppError::Validation(
                "status: must be approved or rejected".to_string(),
            ));
        }

        let request = queries::get_access_request(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Access request {} not found", id)))?;
        let listing = listings::get_listing(&self.pool, request.listing_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Listing {} not found", request.listing_id))
            })?;
        if !actor.is_or_admin(listing.seller_id) {
            return Err(AppError::Forbidden("Only the seller can review this request".to_string()));
        }

        let reviewed = match queries::review(&self.pool, id, status).await? {
            Some(reviewed) => reviewed,
            None => {
                self.expire_stale().await?;
                let reason = if request.status.is_active(request.expires_at, Utc::now()) {
                    "Access request was reviewed concurrently".to_string()
                } else if request.status == AccessRequestStatus::Pending {
                    "Access request has expired".to_string()
                } else {
                    format!("Access request is already {}", request.status)
                };
                return Err(AppError::Conflict(reason));
            }
        };

        tracing::info!(request_id = %id, status = %status, "Access request reviewed");
        self.notifier.dispatch(Notification::AccessReviewed {
            recipient: reviewed.buyer_id,
            request_id: reviewed.id,
            status,
        });
        Ok(reviewed)
    }

    pub async fn expire_stale(&self) -> Result<u64, AppError> {
        let expired = queries::expire_stale(&self.pool).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired stale access requests");
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_client_shape() {
        let listing = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        let body: CreateAccessRequest = serde_json::from_value(serde_json::json!({
            "buyerId": buyer,
            "noteListingId": listing,
            "requestType": "documents",
            "expiresAt": "2030-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(body.buyer_id, Some(buyer));
        assert_eq!(body.note_listing_id, listing);
        assert_eq!(body.request_type, AccessRequestType::Documents);
    }

    #[test]
    fn buyer_and_expiry_are_optional() {
        let body: CreateAccessRequest = serde_json::from_value(serde_json::json!({
            "listingId": Uuid::new_v4(),
            "requestType": "contact"
        }))
        .unwrap();
        assert!(body.buyer_id.is_none());
        assert!(body.expires_at.is_none());
    }
}
