use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    AccessRequestStatus, AccessRequestType, FileCategory, InquiryStatus, ListingStatus,
    PerformanceStatus, Phase, PropertyType, TaskStatus, TimelineEventType, TransactionStatus,
};

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: String,
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
    #[sqlx(try_from = "Option<String>")]
    pub performance_status: OptionalPerformance,
    pub property_address: String,
    pub property_state: String,
    pub property_city: String,
    pub property_zip: String,
    pub property_county: Option<String>,
    #[sqlx(try_from = "String")]
    pub property_type: PropertyType,
    #[schema(value_type = String)]
    pub property_value: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub loan_to_value_ratio: Option<BigDecimal>,
    #[schema(value_type = String)]
    pub asking_price: BigDecimal,
    #[sqlx(try_from = "String")]
    pub status: ListingStatus,
    pub review_note: Option<String>,
    pub view_count: i32,
    pub favorite_count: i32,
    pub inquiry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Nullable performance column. A newtype so the row can decode it with
/// `try_from` like the other enum columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct OptionalPerformance(pub Option<PerformanceStatus>);

impl TryFrom<Option<String>> for OptionalPerformance {
    type Error = crate::domain::UnknownVariant;

    fn try_from(value: Option<String>) -> Result<Self, Self::Error> {
        value
            .map(PerformanceStatus::try_from)
            .transpose()
            .map(OptionalPerformance)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Inquiry {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub listing_id: Uuid,
    pub message: String,
    #[schema(value_type = Option<String>)]
    pub offer_amount: Option<BigDecimal>,
    #[sqlx(try_from = "String")]
    pub status: InquiryStatus,
    pub response_message: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub listing_id: Uuid,
    #[sqlx(try_from = "String")]
    pub request_type: AccessRequestType,
    #[sqlx(try_from = "String")]
    pub status: AccessRequestStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub listing_id: Uuid,
    pub inquiry_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub initial_amount: BigDecimal,
    #[schema(value_type = Option<String>)]
    pub final_amount: Option<BigDecimal>,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    #[sqlx(try_from = "String")]
    pub current_phase: Phase,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTask {
    pub id: Uuid,
    pub transaction_id: Uuid,
    #[sqlx(try_from = "String")]
    pub phase: Phase,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: TaskStatus,
    pub is_required: bool,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub completed_by: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFile {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub uploaded_by: Uuid,
    pub filename: String,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
    pub is_public: bool,
    #[sqlx(try_from = "String")]
    pub category: FileCategory,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub description: String,
    #[sqlx(try_from = "String")]
    pub event_type: TimelineEventType,
    pub user_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub file_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
