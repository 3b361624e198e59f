use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::db::models::AccessRequest;
use crate::domain::AccessRequestStatus;

pub async fn insert_access_request<'e>(
    executor: impl PgExecutor<'e>,
    request: &AccessRequest,
) -> Result<AccessRequest> {
    sqlx::query_as::<_, AccessRequest>(
        r#"
        INSERT INTO access_requests (
            id, buyer_id, listing_id, request_type, status, expires_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(request.id)
    .bind(request.buyer_id)
    .bind(request.listing_id)
    .bind(request.request_type.as_str())
    .bind(request.status.as_str())
    .bind(request.expires_at)
    .bind(request.created_at)
    .bind(request.updated_at)
    .fetch_one(executor)
    .await
}

pub async fn get_access_request<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<AccessRequest>> {
    sqlx::query_as::<_, AccessRequest>("SELECT * FROM access_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// Requests visible to `user_id`: those they made and those made against
/// their listings. Admins pass `None` and see everything.
pub async fn list_visible_to<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Option<Uuid>,
) -> Result<Vec<AccessRequest>> {
    sqlx::query_as::<_, AccessRequest>(
        r#"
        SELECT a.* FROM access_requests a
        JOIN note_listings l ON l.id = a.listing_id
        WHERE $1::uuid IS NULL OR a.buyer_id = $1 OR l.seller_id = $1
        ORDER BY a.created_at DESC, a.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

/// Expires pending requests for one (buyer, listing) pair whose window has
/// closed, freeing the pair for a new request.
pub async fn expire_stale_for_pair<'e>(
    executor: impl PgExecutor<'e>,
    buyer_id: Uuid,
    listing_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE access_requests
        SET status = 'expired', updated_at = NOW()
        WHERE buyer_id = $1 AND listing_id = $2
          AND status = 'pending' AND expires_at <= NOW()
        "#,
    )
    .bind(buyer_id)
    .bind(listing_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn expire_stale<'e>(executor: impl PgExecutor<'e>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE access_requests
        SET status = 'expired', updated_at = NOW()
        WHERE status = 'pending' AND expires_at <= NOW()
        "#,
    )
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Review of a still-active request. Returns `None` when the request is no
/// longer pending or its window has closed.
pub async fn review<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    status: AccessRequestStatus,
) -> Result<Option<AccessRequest>> {
    sqlx::query_as::<_, AccessRequest>(
        r#"
        UPDATE access_requests
        SET status = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'pending' AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(executor)
    .await
}
