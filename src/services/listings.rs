use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::listings as queries;
use crate::db::models::{Listing, OptionalPerformance};
use crate::domain::listing::{authorize_status_change, StatusChangeRefusal};
use crate::domain::{Actor, ListingStatus, PerformanceStatus, PropertyType};
use crate::error::AppError;
use crate::search::SearchRequest;
use crate::services::notifications::{Notification, NotificationDispatcher};
use crate::validation::{
    non_blank, normalize_code, sanitize_string, sanitize_text, validate_max_len,
    validate_non_negative, validate_percentage, validate_positive_amount, validate_state_code,
    validate_text, validate_zip, ValidationError, ADDRESS_MAX_LEN, CODE_MAX_LEN,
    DESCRIPTION_MAX_LEN, TITLE_MAX_LEN,
};

/// Seller-supplied listing fields.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub note_type: String,
    #[schema(value_type = String)]
    pub original_loan_amount: BigDecimal,
    #[schema(value_type = String)]
    pub current_loan_amount: BigDecimal,
    #[schema(value_type = String)]
    pub interest_rate: BigDecimal,
    pub loan_term_months: i32,
    pub remaining_term_months: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub monthly_payment: Option<BigDecimal>,
    pub origination_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub amortization_type: Option<String>,
    pub payment_frequency: Option<String>,
    pub collateral_type: Option<String>,
    pub performance_status: Option<PerformanceStatus>,
    pub property_address: String,
    pub property_state: String,
    pub property_city: String,
    pub property_zip: String,
    pub property_county: Option<String>,
    pub property_type: PropertyType,
    #[schema(value_type = String)]
    pub property_value: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub loan_to_value_ratio: Option<BigDecimal>,
    #[schema(value_type = String)]
    pub asking_price: BigDecimal,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub note_type: Option<String>,
    #[schema(value_type = Option<String>)]
    pub original_loan_amount: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub current_loan_amount: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub interest_rate: Option<BigDecimal>,
    pub loan_term_months: Option<i32>,
    pub remaining_term_months: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub monthly_payment: Option<BigDecimal>,
    pub origination_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub amortization_type: Option<String>,
    pub payment_frequency: Option<String>,
    pub collateral_type: Option<String>,
    pub performance_status: Option<PerformanceStatus>,
    pub property_address: Option<String>,
    pub property_state: Option<String>,
    pub property_city: Option<String>,
    pub property_zip: Option<String>,
    pub property_county: Option<String>,
    pub property_type: Option<PropertyType>,
    #[schema(value_type = Option<String>)]
    pub property_value: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub loan_to_value_ratio: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub asking_price: Option<BigDecimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Clone)]
pub struct ListingService {
    pool: PgPool,
    notifier: NotificationDispatcher,
}

impl ListingService {
    pub fn new(pool: PgPool, notifier: NotificationDispatcher) -> Self {
        Self { pool, notifier }
    }

    pub async fn create(&self, actor: &Actor, input: ListingInput) -> Result<Listing, AppError> {
        let now = Utc::now();
        let mut listing = Listing {
            id: Uuid::new_v4(),
            seller_id: actor.user_id,
            title: input.title,
            description: input.description.unwrap_or_default(),
            note_type: input.note_type,
            original_loan_amount: input.original_loan_amount,
            current_loan_amount: input.current_loan_amount,
            interest_rate: input.interest_rate,
            loan_term_months: input.loan_term_months,
            remaining_term_months: input.remaining_term_months,
            monthly_payment: input.monthly_payment,
            origination_date: input.origination_date,
            maturity_date: input.maturity_date,
            amortization_type: input.amortization_type,
            payment_frequency: input.payment_frequency,
            collateral_type: input.collateral_type,
            performance_status: OptionalPerformance(input.performance_status),
            property_address: input.property_address,
            property_state: input.property_state,
            property_city: input.property_city,
            property_zip: input.property_zip,
            property_county: input.property_county,
            property_type: input.property_type,
            property_value: input.property_value,
            loan_to_value_ratio: input.loan_to_value_ratio,
            asking_price: input.asking_price,
            status: ListingStatus::Draft,
            review_note: None,
            view_count: 0,
            favorite_count: 0,
            inquiry_count: 0,
            created_at: now,
            updated_at: now,
        };
        normalize_listing(&mut listing)?;

        let saved = queries::insert_listing(&self.pool, &listing).await?;
        tracing::info!(listing_id = %saved.id, seller_id = %saved.seller_id, "Listing created");
        Ok(saved)
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        changes: ListingUpdate,
    ) -> Result<Listing, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut listing = queries::get_listing_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| listing_not_found(id))?;
        if !actor.is_or_admin(listing.seller_id) {
            return Err(AppError::Forbidden("Only the seller can edit this listing".to_string()));
        }
        if !listing.status.is_editable() {
            return Err(AppError::Conflict(format!(
                "A {} listing can no longer be edited",
                listing.status
            )));
        }

        let recompute_ltv = changes.loan_to_value_ratio.is_none()
            && (changes.current_loan_amount.is_some() || changes.property_value.is_some());
        apply_update(&mut listing, changes);
        if recompute_ltv {
            listing.loan_to_value_ratio = None;
        }
        normalize_listing(&mut listing)?;

        let saved = queries::update_listing(&mut *tx, &listing).await?;
        tx.commit().await?;

        tracing::info!(listing_id = %saved.id, "Listing updated");
        Ok(saved)
    }

    /// Fetches a listing. Views by anyone but the seller are counted.
    /// Listings that are not yet public are only shown to their seller and
    /// admins.
    pub async fn get(&self, viewer: Option<&Actor>, id: Uuid) -> Result<Listing, AppError> {
        let listing = queries::get_listing(&self.pool, id)
            .await?
            .ok_or_else(|| listing_not_found(id))?;

        let is_owner_or_admin = viewer.map_or(false, |v| v.is_or_admin(listing.seller_id));
        if !listing.status.is_public() && !is_owner_or_admin {
            return Err(listing_not_found(id));
        }

        if viewer.map_or(true, |v| v.user_id != listing.seller_id) {
            if let Some(counted) = queries::increment_view_count(&self.pool, id).await? {
                return Ok(counted);
            }
        }
        Ok(listing)
    }

    /// A seller sees all of their own listings; everyone else only the public ones.
    pub async fn by_seller(
        &self,
        viewer: Option<&Actor>,
        seller_id: Uuid,
    ) -> Result<Vec<Listing>, AppError> {
        let listings = queries::list_by_seller(&self.pool, seller_id).await?;
        if viewer.map_or(false, |v| v.is_or_admin(seller_id)) {
            return Ok(listings);
        }
        Ok(listings
            .into_iter()
            .filter(|l| l.status.is_public())
            .collect())
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<ListingPage, AppError> {
        let (items, total) = queries::search_listings(&self.pool, request).await?;
        tracing::debug!(total, returned = items.len(), "Listing search");
        Ok(ListingPage {
            items,
            total,
            limit: request.page.limit,
            offset: request.page.offset,
        })
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let listing = queries::get_listing_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| listing_not_found(id))?;
        if !actor.is_or_admin(listing.seller_id) {
            return Err(AppError::Forbidden("Only the seller can delete this listing".to_string()));
        }
        if !listing.status.is_deletable() {
            return Err(AppError::Conflict(format!(
                "A {} listing cannot be deleted",
                listing.status
            )));
        }

        queries::delete_listing(&mut *tx, id).await?;
        tx.commit().await?;

        tracing::info!(listing_id = %id, "Listing deleted");
        Ok(())
    }

    /// draft → pending, by the seller.
    pub async fn submit(&self, actor: &Actor, id: Uuid) -> Result<Listing, AppError> {
        self.change_status(actor, id, ListingStatus::Pending, None).await
    }

    /// pending → active, by an admin.
    pub async fn approve(&self, actor: &Actor, id: Uuid) -> Result<Listing, AppError> {
        self.change_status(actor, id, ListingStatus::Active, None).await
    }

    /// pending → rejected, by an admin, with an optional note for the seller.
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        note: Option<String>,
    ) -> Result<Listing, AppError> {
        let note = match note.as_deref().map(sanitize_text).filter(|n| !n.is_empty()) {
            Some(note) => {
                validate_max_len("reviewNote", &note, DESCRIPTION_MAX_LEN)?;
                Some(note)
            }
            None => None,
        };
        self.change_status(actor, id, ListingStatus::Rejected, note).await
    }

    async fn change_status(
        &self,
        actor: &Actor,
        id: Uuid,
        next: ListingStatus,
        review_note: Option<String>,
    ) -> Result<Listing, AppError> {
        let listing = queries::get_listing(&self.pool, id)
            .await?
            .ok_or_else(|| listing_not_found(id))?;

        match authorize_status_change(actor, listing.seller_id, listing.status, next) {
            Ok(()) => {}
            Err(StatusChangeRefusal::NotPermitted) => {
                return Err(AppError::Forbidden(format!(
                    "Not allowed to move this listing to {}",
                    next
                )));
            }
            Err(StatusChangeRefusal::InvalidTransition) => {
                return Err(AppError::Conflict(format!(
                    "Cannot move a {} listing to {}",
                    listing.status, next
                )));
            }
        }

        let updated = queries::transition_status(
            &self.pool,
            id,
            listing.status,
            next,
            review_note.as_deref(),
        )
        .await?
        .ok_or_else(|| AppError::Conflict("Listing status changed concurrently".to_string()))?;

        tracing::info!(
            listing_id = %id,
            from = %listing.status,
            to = %next,
            "Listing status changed"
        );
        if matches!(next, ListingStatus::Active | ListingStatus::Rejected) {
            self.notifier.dispatch(Notification::ListingReviewed {
                recipient: updated.seller_id,
                listing_id: updated.id,
                status: next,
            });
        }
        Ok(updated)
    }
}

fn listing_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Listing {} not found", id))
}

fn apply_update(listing: &mut Listing, changes: ListingUpdate) {
    macro_rules! set {
        ($($field:ident),+ $(,)?) => {
            $(if let Some(value) = changes.$field { listing.$field = value; })+
        };
    }
    macro_rules! set_optional {
        ($($field:ident),+ $(,)?) => {
            $(if let Some(value) = changes.$field { listing.$field = Some(value); })+
        };
    }

    set!(
        title,
        description,
        note_type,
        original_loan_amount,
        current_loan_amount,
        interest_rate,
        loan_term_months,
        property_address,
        property_state,
        property_city,
        property_zip,
        property_type,
        property_value,
        asking_price,
    );
    set_optional!(
        remaining_term_months,
        monthly_payment,
        origination_date,
        maturity_date,
        amortization_type,
        payment_frequency,
        collateral_type,
        property_county,
        loan_to_value_ratio,
    );
    if let Some(performance) = changes.performance_status {
        listing.performance_status = OptionalPerformance(Some(performance));
    }
}

/// Cleans free text, canonicalizes codes and checks every listing invariant.
/// Fills in the loan-to-value ratio when it was not supplied.
fn normalize_listing(listing: &mut Listing) -> Result<(), ValidationError> {
    listing.title = sanitize_string(&listing.title);
    validate_text("title", &listing.title, TITLE_MAX_LEN)?;
    listing.description = sanitize_text(&listing.description);
    validate_max_len("description", &listing.description, DESCRIPTION_MAX_LEN)?;

    listing.note_type = normalize_code(&listing.note_type);
    validate_text("noteType", &listing.note_type, CODE_MAX_LEN)?;
    for (field, value) in [
        ("amortizationType", &mut listing.amortization_type),
        ("paymentFrequency", &mut listing.payment_frequency),
        ("collateralType", &mut listing.collateral_type),
    ] {
        *value = non_blank(value.as_deref()).map(|v| normalize_code(&v));
        if let Some(code) = value {
            validate_max_len(field, code, CODE_MAX_LEN)?;
        }
    }

    validate_positive_amount("originalLoanAmount", &listing.original_loan_amount)?;
    validate_non_negative("currentLoanAmount", &listing.current_loan_amount)?;
    if listing.current_loan_amount > listing.original_loan_amount {
        return Err(ValidationError::new(
            "currentLoanAmount",
            "must not exceed the original loan amount",
        ));
    }
    validate_percentage("interestRate", &listing.interest_rate)?;
    if listing.loan_term_months <= 0 {
        return Err(ValidationError::new("loanTermMonths", "must be greater than zero"));
    }
    if let Some(remaining) = listing.remaining_term_months {
        if remaining < 0 || remaining > listing.loan_term_months {
            return Err(ValidationError::new(
                "remainingTermMonths",
                "must be between 0 and the loan term",
            ));
        }
    }
    if let Some(payment) = &listing.monthly_payment {
        validate_non_negative("monthlyPayment", payment)?;
    }
    if let (Some(origination), Some(maturity)) = (listing.origination_date, listing.maturity_date) {
        if maturity < origination {
            return Err(ValidationError::new(
                "maturityDate",
                "must not be before the origination date",
            ));
        }
    }

    listing.property_address = sanitize_string(&listing.property_address);
    validate_text("propertyAddress", &listing.property_address, ADDRESS_MAX_LEN)?;
    listing.property_state = validate_state_code(&listing.property_state)?;
    listing.property_city = sanitize_string(&listing.property_city);
    validate_text("propertyCity", &listing.property_city, ADDRESS_MAX_LEN)?;
    listing.property_zip = validate_zip(&listing.property_zip)?;
    listing.property_county = non_blank(listing.property_county.as_deref());
    if let Some(county) = &listing.property_county {
        validate_max_len("propertyCounty", county, ADDRESS_MAX_LEN)?;
    }

    validate_positive_amount("propertyValue", &listing.property_value)?;
    validate_positive_amount("askingPrice", &listing.asking_price)?;
    match &listing.loan_to_value_ratio {
        Some(ltv) => validate_non_negative("loanToValueRatio", ltv)?,
        None => {
            listing.loan_to_value_ratio = Some(loan_to_value(
                &listing.current_loan_amount,
                &listing.property_value,
            ))
        }
    }

    Ok(())
}

/// `current / value` as a percentage, rounded to two places.
fn loan_to_value(current: &BigDecimal, property_value: &BigDecimal) -> BigDecimal {
    (current * BigDecimal::from(100) / property_value).round(2)
}
