use sqlx::{PgExecutor, PgPool, Result};
use uuid::Uuid;

use crate::db::models::Listing;
use crate::domain::ListingStatus;
use crate::search::{self, SearchRequest};

pub async fn insert_listing<'e>(
    executor: impl PgExecutor<'e>,
    listing: &Listing,
) -> Result<Listing> {
    sqlx::query_as::<_, Listing>(
        r#"
        INSERT INTO note_listings (
            id, seller_id, title, description, note_type,
            original_loan_amount, current_loan_amount, interest_rate, loan_term_months,
            remaining_term_months, monthly_payment, origination_date, maturity_date,
            amortization_type, payment_frequency, collateral_type, performance_status,
            property_address, property_state, property_city, property_zip, property_county,
            property_type, property_value, loan_to_value_ratio, asking_price,
            status, review_note, view_count, favorite_count, inquiry_count,
            created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
            $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32, $33
        )
        RETURNING *
        "#,
    )
    .bind(listing.id)
    .bind(listing.seller_id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(&listing.note_type)
    .bind(&listing.original_loan_amount)
    .bind(&listing.current_loan_amount)
    .bind(&listing.interest_rate)
    .bind(listing.loan_term_months)
    .bind(listing.remaining_term_months)
    .bind(&listing.monthly_payment)
    .bind(listing.origination_date)
    .bind(listing.maturity_date)
    .bind(&listing.amortization_type)
    .bind(&listing.payment_frequency)
    .bind(&listing.collateral_type)
    .bind(listing.performance_status.0.map(|status| status.as_str()))
    .bind(&listing.property_address)
    .bind(&listing.property_state)
    .bind(&listing.property_city)
    .bind(&listing.property_zip)
    .bind(&listing.property_county)
    .bind(listing.property_type.as_str())
    .bind(&listing.property_value)
    .bind(&listing.loan_to_value_ratio)
    .bind(&listing.asking_price)
    .bind(listing.status.as_str())
    .bind(&listing.review_note)
    .bind(listing.view_count)
    .bind(listing.favorite_count)
    .bind(listing.inquiry_count)
    .bind(listing.created_at)
    .bind(listing.updated_at)
    .fetch_one(executor)
    .await
}

/// Writes the seller-editable columns. Status and counters are owned by
/// their own queries.
pub async fn update_listing<'e>(
    executor: impl PgExecutor<'e>,
    listing: &Listing,
) -> Result<Listing> {
    sqlx::query_as::<_, Listing>(
        r#"
        UPDATE note_listings SET
            title = $2, description = $3, note_type = $4,
            original_loan_amount = $5, current_loan_amount = $6, interest_rate = $7,
            loan_term_months = $8, remaining_term_months = $9, monthly_payment = $10,
            origination_date = $11, maturity_date = $12, amortization_type = $13,
            payment_frequency = $14, collateral_type = $15, performance_status = $16,
            property_address = $17, property_state = $18, property_city = $19,
            property_zip = $20, property_county = $21, property_type = $22,
            property_value = $23, loan_to_value_ratio = $24, asking_price = $25,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(listing.id)
    .bind(&listing.title)
    .bind(&listing.description)
    .bind(&listing.note_type)
    .bind(&listing.original_loan_amount)
    .bind(&listing.current_loan_amount)
    .bind(&listing.interest_rate)
    .bind(listing.loan_term_months)
    .bind(listing.remaining_term_months)
    .bind(&listing.monthly_payment)
    .bind(listing.origination_date)
    .bind(listing.maturity_date)
    .bind(&listing.amortization_type)
    .bind(&listing.payment_frequency)
    .bind(&listing.collateral_type)
    .bind(listing.performance_status.0.map(|status| status.as_str()))
    .bind(&listing.property_address)
    .bind(&listing.property_state)
    .bind(&listing.property_city)
    .bind(&listing.property_zip)
    .bind(&listing.property_county)
    .bind(listing.property_type.as_str())
    .bind(&listing.property_value)
    .bind(&listing.loan_to_value_ratio)
    .bind(&listing.asking_price)
    .fetch_one(executor)
    .await
}

pub async fn get_listing<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>("SELECT * FROM note_listings WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn get_listing_for_update<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>("SELECT * FROM note_listings WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn list_by_seller(pool: &PgPool, seller_id: Uuid) -> Result<Vec<Listing>> {
    sqlx::query_as::<_, Listing>(
        "SELECT * FROM note_listings WHERE seller_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(seller_id)
    .fetch_all(pool)
    .await
}

pub async fn delete_listing<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM note_listings WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Moves a listing from `from` to `to`. Returns `None` when the row is no
/// longer in `from`, so concurrent reviewers cannot both win.
pub async fn transition_status<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    from: ListingStatus,
    to: ListingStatus,
    review_note: Option<&str>,
) -> Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(
        r#"
        UPDATE note_listings
        SET status = $3, review_note = COALESCE($4, review_note), updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(from.as_str())
    .bind(to.as_str())
    .bind(review_note)
    .fetch_optional(executor)
    .await
}

pub async fn increment_view_count<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<Listing>> {
    sqlx::query_as::<_, Listing>(
        "UPDATE note_listings SET view_count = view_count + 1 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub async fn increment_inquiry_count<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE note_listings
        SET inquiry_count = inquiry_count + 1, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

/// Returns the matching page and the total match count.
pub async fn search_listings(
    pool: &PgPool,
    request: &SearchRequest,
) -> Result<(Vec<Listing>, i64)> {
    let mut count = search::count_query(&request.filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

    let mut page = search::page_query(request);
    let items = page.build_query_as::<Listing>().fetch_all(pool).await?;

    Ok((items, total))
}
