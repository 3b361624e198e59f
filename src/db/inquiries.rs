use bigdecimal::BigDecimal;
use sqlx::{PgExecutor, Result};
use uuid::Uuid;

use crate::db::models::Inquiry;
use crate::domain::InquiryStatus;

pub async fn insert_inquiry<'e>(
    executor: impl PgExecutor<'e>,
    inquiry: &Inquiry,
) -> Result<Inquiry> {
    sqlx::query_as::<_, Inquiry>(
        r#"
        INSERT INTO inquiries (
            id, buyer_id, listing_id, message, offer_amount, status,
            response_message, responded_at, expires_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(inquiry.id)
    .bind(inquiry.buyer_id)
    .bind(inquiry.listing_id)
    .bind(&inquiry.message)
    .bind(&inquiry.offer_amount)
    .bind(inquiry.status.as_str())
    .bind(&inquiry.response_message)
    .bind(inquiry.responded_at)
    .bind(inquiry.expires_at)
    .bind(inquiry.created_at)
    .bind(inquiry.updated_at)
    .fetch_one(executor)
    .await
}

pub async fn get_inquiry<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Inquiry>> {
    sqlx::query_as::<_, Inquiry>("SELECT * FROM inquiries WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_by_buyer<'e>(
    executor: impl PgExecutor<'e>,
    buyer_id: Uuid,
) -> Result<Vec<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        "SELECT * FROM inquiries WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(buyer_id)
    .fetch_all(executor)
    .await
}

pub async fn list_by_listing<'e>(
    executor: impl PgExecutor<'e>,
    listing_id: Uuid,
) -> Result<Vec<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        "SELECT * FROM inquiries WHERE listing_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(listing_id)
    .fetch_all(executor)
    .await
}

/// Inquiries received on any listing owned by `seller_id`.
pub async fn list_by_seller<'e>(
    executor: impl PgExecutor<'e>,
    seller_id: Uuid,
) -> Result<Vec<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        r#"
        SELECT i.* FROM inquiries i
        JOIN note_listings l ON l.id = i.listing_id
        WHERE l.seller_id = $1
        ORDER BY i.created_at DESC, i.id DESC
        "#,
    )
    .bind(seller_id)
    .fetch_all(executor)
    .await
}

/// Single compare-and-set response. Returns `None` when the inquiry was no
/// longer open or had expired by the time the update ran.
pub async fn respond<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    status: InquiryStatus,
    response_message: &str,
) -> Result<Option<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        r#"
        UPDATE inquiries
        SET status = $2,
            response_message = $3,
            responded_at = CASE WHEN $4 THEN NOW() ELSE responded_at END,
            updated_at = NOW()
        WHERE id = $1
          AND status IN ('pending', 'countered')
          AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(response_message)
    .bind(status.stamps_response_time())
    .fetch_optional(executor)
    .await
}

pub async fn withdraw<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        r#"
        UPDATE inquiries
        SET status = 'withdrawn', updated_at = NOW()
        WHERE id = $1 AND status IN ('pending', 'countered')
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Buyer edits, allowed only while the inquiry is still pending.
pub async fn update_pending<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    message: Option<&str>,
    offer_amount: Option<&BigDecimal>,
) -> Result<Option<Inquiry>> {
    sqlx::query_as::<_, Inquiry>(
        r#"
        UPDATE inquiries
        SET message = COALESCE($2, message),
            offer_amount = COALESCE($3, offer_amount),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending' AND expires_at > NOW()
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(message)
    .bind(offer_amount)
    .fetch_optional(executor)
    .await
}

pub async fn delete_inquiry<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM inquiries WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Flips every open (pending or countered) inquiry past its deadline to
/// `expired`.
pub async fn expire_stale<'e>(executor: impl PgExecutor<'e>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE inquiries
        SET status = 'expired', updated_at = NOW()
        WHERE status IN ('pending', 'countered') AND expires_at <= NOW()
        "#,
    )
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
