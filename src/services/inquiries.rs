use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Inquiry, Listing, Transaction};
use crate::db::{inquiries as queries, listings};
use crate::domain::{Actor, InquiryStatus, ListingStatus};
use crate::error::AppError;
use crate::services::notifications::{Notification, NotificationDispatcher};
use crate::services::workflow::open_transaction;
use crate::validation::{sanitize_text, validate_positive_amount, validate_text, MESSAGE_MAX_LEN};

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInquiry {
    #[serde(alias = "noteListingId")]
    pub listing_id: Uuid,
    pub message: String,
    #[schema(value_type = Option<String>)]
    pub offer_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInquiry {
    pub message: Option<String>,
    #[schema(value_type = Option<String>)]
    pub offer_amount: Option<BigDecimal>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondInquiry {
    pub status: InquiryStatus,
    pub response_message: String,
}

/// A seller's answer. Accepting also opens the deal.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InquiryResponse {
    pub inquiry: Inquiry,
    pub transaction: Option<Transaction>,
}

#[derive(Clone)]
pub struct InquiryService {
    pool: PgPool,
    notifier: NotificationDispatcher,
    ttl: Duration,
}

impl InquiryService {
    pub fn new(pool: PgPool, notifier: NotificationDispatcher, ttl_days: i64) -> Self {
        Self {
            pool,
            notifier,
            ttl: Duration::days(ttl_days),
        }
    }

    /// Records a buyer's inquiry and counts it against the listing in the
    /// same database transaction.
    pub async fn create(&self, actor: &Actor, input: CreateInquiry) -> Result<Inquiry, AppError> {
        let message = sanitize_text(&input.message);
        validate_text("message", &message, MESSAGE_MAX_LEN)?;
        if let Some(offer) = &input.offer_amount {
            validate_positive_amount("offerAmount", offer)?;
        }

        let mut tx = self.pool.begin().await?;

        let listing = listings::get_listing(&mut *tx, input.listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", input.listing_id)))?;
        if listing.seller_id == actor.user_id {
            return Err(AppError::Forbidden(
                "Sellers cannot send inquiries on their own listing".to_string(),
            ));
        }
        if listing.status != ListingStatus::Active {
            return Err(AppError::Conflict("Listing is not accepting inquiries".to_string()));
        }

        let now = Utc::now();
        let inquiry = Inquiry {
            id: Uuid::new_v4(),
            buyer_id: actor.user_id,
            listing_id: listing.id,
            message,
            offer_amount: input.offer_amount,
            status: InquiryStatus::Pending,
            response_message: None,
            responded_at: None,
            expires_at: now + self.ttl,
            created_at: now,
            updated_at: now,
        };
        let saved = queries::insert_inquiry(&mut *tx, &inquiry).await?;
        listings::increment_inquiry_count(&mut *tx, listing.id).await?;
        tx.commit().await?;

        tracing::info!(
            inquiry_id = %saved.id,
            listing_id = %listing.id,
            buyer_id = %actor.user_id,
            "Inquiry created"
        );
        self.notifier.dispatch(Notification::InquiryReceived {
            recipient: listing.seller_id,
            listing_id: listing.id,
            inquiry_id: saved.id,
        });
        Ok(saved)
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<Inquiry, AppError> {
        self.expire_stale().await?;
        let (inquiry, listing) = self.load(id).await?;
        if !actor.is_party_or_admin(inquiry.buyer_id, listing.seller_id) {
            return Err(AppError::Forbidden("Not a party to this inquiry".to_string()));
        }
        Ok(inquiry)
    }

    pub async fn list_by_buyer(
        &self,
        actor: &Actor,
        buyer_id: Uuid,
    ) -> Result<Vec<Inquiry>, AppError> {
        if !actor.is_or_admin(buyer_id) {
            return Err(AppError::Forbidden("Cannot view another buyer's inquiries".to_string()));
        }
        self.expire_stale().await?;
        Ok(queries::list_by_buyer(&self.pool, buyer_id).await?)
    }

    pub async fn list_by_listing(
        &self,
        actor: &Actor,
        listing_id: Uuid,
    ) -> Result<Vec<Inquiry>, AppError> {
        let listing = listings::get_listing(&self.pool, listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Listing {} not found", listing_id)))?;
        if !actor.is_or_admin(listing.seller_id) {
            return Err(AppError::Forbidden("Only the seller can view these inquiries".to_string()));
        }
        self.expire_stale().await?;
        Ok(queries::list_by_listing(&self.pool, listing_id).await?)
    }

    pub async fn list_by_seller(
        &self,
        actor: &Actor,
        seller_id: Uuid,
    ) -> Result<Vec<Inquiry>, AppError> {
        if !actor.is_or_admin(seller_id) {
            return Err(AppError::Forbidden("Cannot view another seller's inquiries".to_string()));
        }
        self.expire_stale().await?;
        Ok(queries::list_by_seller(&self.pool, seller_id).await?)
    }

    /// Seller's answer as a single compare-and-set. A second answer after
    /// accept/reject, or one racing with it, gets a Conflict.
    pub async fn respond(
        &self,
        actor: &Actor,
        id: Uuid,
        input: RespondInquiry,
    ) -> Result<InquiryResponse, AppError> {
        if !input.status.is_response() {
            return Err(AppError::Validation(format!(
                "status: must be one of accepted, rejected, countered (got {})",
                input.status
            )));
        }
        let message = sanitize_text(&input.response_message);
        validate_text("responseMessage", &message, MESSAGE_MAX_LEN)?;

        let mut tx = self.pool.begin().await?;

        let inquiry = queries::get_inquiry(&mut *tx, id)
            .await?
            .ok_or_else(|| inquiry_not_found(id))?;
        let listing = listings::get_listing(&mut *tx, inquiry.listing_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Listing {} not found", inquiry.listing_id))
            })?;
        if actor.user_id != listing.seller_id {
            return Err(AppError::Forbidden(
                "Only the seller can respond to this inquiry".to_string(),
            ));
        }

        let updated = match queries::respond(&mut *tx, id, input.status, &message).await? {
            Some(updated) => updated,
            None if inquiry.status.is_open() => {
                return Err(AppError::Conflict("Inquiry has expired".to_string()));
            }
            None => {
                return Err(AppError::Conflict(format!(
                    "Inquiry is already {}",
                    inquiry.status
                )));
            }
        };

        let transaction = if updated.status == InquiryStatus::Accepted {
            if listing.status != ListingStatus::Active {
                return Err(AppError::Conflict(format!(
                    "Cannot accept an offer on a {} listing",
                    listing.status
                )));
            }
            let amount = updated
                .offer_amount
                .clone()
                .unwrap_or_else(|| listing.asking_price.clone());
            let deal = open_transaction(
                &mut tx,
                &listing,
                updated.buyer_id,
                Some(updated.id),
                amount,
                actor.user_id,
            )
            .await?;
            Some(deal)
        } else {
            None
        };

        tx.commit().await?;

        tracing::info!(inquiry_id = %id, status = %updated.status, "Inquiry answered");
        self.notifier.dispatch(Notification::InquiryResponded {
            recipient: updated.buyer_id,
            inquiry_id: updated.id,
            status: updated.status,
        });
        if let Some(deal) = &transaction {
            for recipient in [deal.buyer_id, deal.seller_id] {
                self.notifier.dispatch(Notification::TransactionCreated {
                    recipient,
                    transaction_id: deal.id,
                });
            }
        }

        Ok(InquiryResponse {
            inquiry: updated,
            transaction,
        })
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: UpdateInquiry,
    ) -> Result<Inquiry, AppError> {
        let message = match changes.message.as_deref().map(sanitize_text) {
            Some(message) => {
                validate_text("message", &message, MESSAGE_MAX_LEN)?;
                Some(message)
            }
            None => None,
        };
        if let Some(offer) = &changes.offer_amount {
            validate_positive_amount("offerAmount", offer)?;
        }

        let (inquiry, _) = self.load(id).await?;
        if inquiry.buyer_id != actor.user_id {
            return Err(AppError::Forbidden("Only the buyer can edit this inquiry".to_string()));
        }

        queries::update_pending(&self.pool, id, message.as_deref(), changes.offer_amount.as_ref())
            .await?
            .ok_or_else(|| AppError::Conflict("Only pending inquiries can be edited".to_string()))
    }

    pub async fn withdraw(&self, actor: &Actor, id: Uuid) -> Result<Inquiry, AppError> {
        let (inquiry, _) = self.load(id).await?;
        if inquiry.buyer_id != actor.user_id {
            return Err(AppError::Forbidden("Only the buyer can withdraw this inquiry".to_string()));
        }
        if !inquiry.status.can_withdraw() {
            return Err(AppError::Conflict(format!("Inquiry is already {}", inquiry.status)));
        }

        let withdrawn = queries::withdraw(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::Conflict("Inquiry was answered concurrently".to_string()))?;
        tracing::info!(inquiry_id = %id, "Inquiry withdrawn");
        Ok(withdrawn)
    }

    /// Hard delete. The listing's inquiry count is a lifetime total and is
    /// left as is.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let (inquiry, _) = self.load(id).await?;
        if !actor.is_or_admin(inquiry.buyer_id) {
            return Err(AppError::Forbidden("Only the buyer can delete this inquiry".to_string()));
        }
        queries::delete_inquiry(&self.pool, id).await?;
        tracing::info!(inquiry_id = %id, "Inquiry deleted");
        Ok(())
    }

    /// Marks pending inquiries past their deadline as expired.
    pub async fn expire_stale(&self) -> Result<u64, AppError> {
        let expired = queries::expire_stale(&self.pool).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired stale inquiries");
        }
        Ok(expired)
    }

    async fn load(&self, id: Uuid) -> Result<(Inquiry, Listing), AppError> {
        let inquiry = queries::get_inquiry(&self.pool, id)
            .await?
            .ok_or_else(|| inquiry_not_found(id))?;
        let listing = listings::get_listing(&self.pool, inquiry.listing_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Listing {} not found", inquiry.listing_id))
            })?;
        Ok((inquiry, listing))
    }
}

fn inquiry_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Inquiry {} not found", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn create_accepts_either_listing_key() {
        let id = Uuid::new_v4();
        let a: CreateInquiry = serde_json::from_value(serde_json::json!({
            "listingId": id, "message": "Interested", "offerAmount": "45000.50"
        }))
        .unwrap();
        let b: CreateInquiry = serde_json::from_value(serde_json::json!({
            "noteListingId": id, "message": "Interested"
        }))
        .unwrap();

        assert_eq!(a.listing_id, id);
        assert_eq!(a.offer_amount, Some(BigDecimal::from_str("45000.50").unwrap()));
        assert_eq!(b.listing_id, id);
        assert!(b.offer_amount.is_none());
    }

    #[test]
    fn respond_body_uses_wire_names() {
        let body: RespondInquiry = serde_json::from_value(serde_json::json!({
            "status": "countered", "responseMessage": "How about 48k?"
        }))
        .unwrap();
        assert_eq!(body.status, InquiryStatus::Countered);
        assert_eq!(body.response_message, "How about 48k?");

        let unknown = serde_json::from_value::<RespondInquiry>(serde_json::json!({
            "status": "maybe", "responseMessage": "?"
        }));
        assert!(unknown.is_err());
    }
}
