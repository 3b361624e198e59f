//! Listing search.
//!
//! Query-string parameters are parsed once into a typed [`ListingFilter`].
//! The filter lowers to a flat list of [`Predicate`]s which are ANDed into
//! the `WHERE` clause of both the page query and the count query.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use std::str::FromStr;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::domain::{Actor, ListingStatus, PerformanceStatus, PropertyType};
use crate::validation::{
    non_blank, normalize_code, validate_max_len, ValidationError, KEYWORD_MAX_LEN,
};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 100;

/// Raw search parameters as they arrive on the query string. Everything is a
/// string so that blank values can be told apart from malformed ones.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    pub price_min: Option<String>,
    pub price_max: Option<String>,
    pub amount_min: Option<String>,
    pub amount_max: Option<String>,
    pub rate_min: Option<String>,
    pub rate_max: Option<String>,
    pub property_value_min: Option<String>,
    pub property_value_max: Option<String>,
    pub ltv_min: Option<String>,
    pub ltv_max: Option<String>,
    pub remaining_term_min: Option<String>,
    pub remaining_term_max: Option<String>,
    pub note_type: Option<String>,
    pub location_state: Option<String>,
    pub location_city: Option<String>,
    pub location_zip: Option<String>,
    pub location_county: Option<String>,
    pub collateral_type: Option<String>,
    pub amortization_type: Option<String>,
    pub payment_frequency: Option<String>,
    /// Comma-separated property types.
    pub property_type: Option<String>,
    /// Comma-separated listing statuses. Defaults to `active`. Draft,
    /// pending and rejected only match the caller's own listings.
    pub status: Option<String>,
    /// Comma-separated performance statuses.
    pub performance_status: Option<String>,
    pub keyword: Option<String>,
    /// `YYYY-MM-DD`
    pub origination_date_from: Option<String>,
    pub origination_date_to: Option<String>,
    pub maturity_date_from: Option<String>,
    pub maturity_date_to: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for Range<T> {
    fn default() -> Self {
        Self { min: None, max: None }
    }
}

/// Who the result page is for. Unpublished listings only reach their seller
/// and admins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Audience {
    #[default]
    Public,
    Seller(Uuid),
    Admin,
}

impl Audience {
    pub fn of(viewer: Option<&Actor>) -> Self {
        match viewer {
            None => Audience::Public,
            Some(actor) if actor.is_admin => Audience::Admin,
            Some(actor) => Audience::Seller(actor.user_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub price: Range<BigDecimal>,
    pub amount: Range<BigDecimal>,
    pub rate: Range<BigDecimal>,
    pub property_value: Range<BigDecimal>,
    pub ltv: Range<BigDecimal>,
    pub remaining_term: Range<i32>,
    pub origination_date: Range<NaiveDate>,
    pub maturity_date: Range<NaiveDate>,
    pub note_type: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub county: Option<String>,
    pub collateral_type: Option<String>,
    pub amortization_type: Option<String>,
    pub payment_frequency: Option<String>,
    pub property_types: Vec<PropertyType>,
    pub statuses: Vec<ListingStatus>,
    pub performance_statuses: Vec<PerformanceStatus>,
    pub keyword: Option<String>,
    pub audience: Audience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    AskingPrice,
    InterestRate,
    CurrentLoanAmount,
    PropertyValue,
    MaturityDate,
    RemainingTerm,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::AskingPrice => "asking_price",
            SortField::InterestRate => "interest_rate",
            SortField::CurrentLoanAmount => "current_loan_amount",
            SortField::PropertyValue => "property_value",
            SortField::MaturityDate => "maturity_date",
            SortField::RemainingTerm => "remaining_term_months",
        }
    }
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "created_at" => Ok(SortField::CreatedAt),
            "asking_price" => Ok(SortField::AskingPrice),
            "interest_rate" => Ok(SortField::InterestRate),
            "current_loan_amount" => Ok(SortField::CurrentLoanAmount),
            "property_value" => Ok(SortField::PropertyValue),
            "maturity_date" => Ok(SortField::MaturityDate),
            "remaining_term_months" => Ok(SortField::RemainingTerm),
            other => Err(ValidationError::new(
                "sort_by",
                format!("cannot sort by '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub filter: ListingFilter,
    pub page: PageRequest,
    pub sort: Sort,
}

/// Comparison value bound into a range predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Decimal(BigDecimal),
    Integer(i32),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    AtLeast(&'static str, Scalar),
    AtMost(&'static str, Scalar),
    Equals(&'static str, String),
    EqualsIgnoreCase(&'static str, String),
    OneOf(&'static str, Vec<String>),
    Keyword(String),
    /// `status` is public, or the row belongs to the given seller.
    PublicOrOwnedBy(Uuid),
}

impl SearchRequest {
    pub fn from_params(params: &SearchParams) -> Result<Self, ValidationError> {
        let filter = ListingFilter {
            price: decimal_range(
                ("price_min", &params.price_min),
                ("price_max", &params.price_max),
            )?,
            amount: decimal_range(
                ("amount_min", &params.amount_min),
                ("amount_max", &params.amount_max),
            )?,
            rate: decimal_range(
                ("rate_min", &params.rate_min),
                ("rate_max", &params.rate_max),
            )?,
            property_value: decimal_range(
                ("property_value_min", &params.property_value_min),
                ("property_value_max", &params.property_value_max),
            )?,
            ltv: decimal_range(("ltv_min", &params.ltv_min), ("ltv_max", &params.ltv_max))?,
            remaining_term: Range {
                min: parse_opt("remaining_term_min", &params.remaining_term_min)?,
                max: parse_opt("remaining_term_max", &params.remaining_term_max)?,
            },
            origination_date: Range {
                min: parse_date("origination_date_from", &params.origination_date_from)?,
                max: parse_date("origination_date_to", &params.origination_date_to)?,
            },
            maturity_date: Range {
                min: parse_date("maturity_date_from", &params.maturity_date_from)?,
                max: parse_date("maturity_date_to", &params.maturity_date_to)?,
            },
            note_type: code(&params.note_type),
            state: non_blank(params.location_state.as_deref()).map(|s| s.to_uppercase()),
            city: non_blank(params.location_city.as_deref()),
            zip: non_blank(params.location_zip.as_deref()),
            county: non_blank(params.location_county.as_deref()),
            collateral_type: code(&params.collateral_type),
            amortization_type: code(&params.amortization_type),
            payment_frequency: code(&params.payment_frequency),
            property_types: parse_list("property_type", &params.property_type)?,
            statuses: parse_list("status", &params.status)?,
            performance_statuses: parse_list("performance_status", &params.performance_status)?,
            keyword: match non_blank(params.keyword.as_deref()) {
                Some(keyword) => {
                    validate_max_len("keyword", &keyword, KEYWORD_MAX_LEN)?;
                    Some(keyword)
                }
                None => None,
            },
            audience: Audience::Public,
        };

        let limit = parse_opt::<i64>("limit", &params.limit)?
            .unwrap_or(DEFAULT_LIMIT)
            .clamp(1, MAX_LIMIT);
        let offset = parse_opt::<i64>("offset", &params.offset)?.unwrap_or(0);
        if offset < 0 {
            return Err(ValidationError::new("offset", "must not be negative"));
        }

        let field = match non_blank(params.sort_by.as_deref()) {
            Some(raw) => raw.parse()?,
            None => SortField::CreatedAt,
        };
        let order = match non_blank(params.sort_order.as_deref()).as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(_) => {
                return Err(ValidationError::new("sort_order", "must be 'asc' or 'desc'"));
            }
        };

        Ok(Self {
            filter,
            page: PageRequest { limit, offset },
            sort: Sort { field, order },
        })
    }

    /// Scopes the request to what `viewer` is allowed to see.
    pub fn visible_to(mut self, viewer: Option<&Actor>) -> Self {
        self.filter.audience = Audience::of(viewer);
        self
    }
}

impl ListingFilter {
    /// Status set the query actually applies: callers that name no status
    /// only ever see active listings.
    pub fn effective_statuses(&self) -> Vec<ListingStatus> {
        if self.statuses.is_empty() {
            vec![ListingStatus::Active]
        } else {
            self.statuses.clone()
        }
    }

    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        push_range(&mut predicates, "asking_price", &self.price, Scalar::Decimal);
        push_range(&mut predicates, "current_loan_amount", &self.amount, Scalar::Decimal);
        push_range(&mut predicates, "interest_rate", &self.rate, Scalar::Decimal);
        push_range(&mut predicates, "property_value", &self.property_value, Scalar::Decimal);
        push_range(&mut predicates, "loan_to_value_ratio", &self.ltv, Scalar::Decimal);
        push_range(
            &mut predicates,
            "remaining_term_months",
            &self.remaining_term,
            Scalar::Integer,
        );
        push_range(&mut predicates, "origination_date", &self.origination_date, Scalar::Date);
        push_range(&mut predicates, "maturity_date", &self.maturity_date, Scalar::Date);

        let exact = [
            ("note_type", &self.note_type),
            ("property_state", &self.state),
            ("property_zip", &self.zip),
            ("collateral_type", &self.collateral_type),
            ("amortization_type", &self.amortization_type),
            ("payment_frequency", &self.payment_frequency),
        ];
        for (column, value) in exact {
            if let Some(value) = value {
                predicates.push(Predicate::Equals(column, value.clone()));
            }
        }
        for (column, value) in [("property_city", &self.city), ("property_county", &self.county)] {
            if let Some(value) = value {
                predicates.push(Predicate::EqualsIgnoreCase(column, value.clone()));
            }
        }

        if !self.property_types.is_empty() {
            predicates.push(Predicate::OneOf(
                "property_type",
                self.property_types.iter().map(|t| t.as_str().to_string()).collect(),
            ));
        }
        let mut statuses = self.effective_statuses();
        let asks_unpublished = statuses.iter().any(|s| !s.is_public());
        if self.audience == Audience::Public {
            statuses.retain(|s| s.is_public());
        }
        predicates.push(Predicate::OneOf("status", status_codes(&statuses)));
        if let (Audience::Seller(seller_id), true) = (self.audience, asks_unpublished) {
            predicates.push(Predicate::PublicOrOwnedBy(seller_id));
        }
        if !self.performance_statuses.is_empty() {
            predicates.push(Predicate::OneOf(
                "performance_status",
                self.performance_statuses
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ));
        }

        if let Some(keyword) = &self.keyword {
            predicates.push(Predicate::Keyword(keyword.clone()));
        }

        predicates
    }
}

impl Predicate {
    fn push_sql(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Predicate::AtLeast(column, value) => {
                builder.push(*column).push(" >= ");
                push_scalar(builder, value);
            }
            Predicate::AtMost(column, value) => {
                builder.push(*column).push(" <= ");
                push_scalar(builder, value);
            }
            Predicate::Equals(column, value) => {
                builder.push(*column).push(" = ").push_bind(value.clone());
            }
            Predicate::EqualsIgnoreCase(column, value) => {
                builder
                    .push("LOWER(")
                    .push(*column)
                    .push(") = LOWER(")
                    .push_bind(value.clone())
                    .push(")");
            }
            Predicate::OneOf(column, values) => {
                builder
                    .push(*column)
                    .push(" = ANY(")
                    .push_bind(values.clone())
                    .push(")");
            }
            Predicate::Keyword(keyword) => {
                let pattern = format!("%{}%", escape_like(keyword));
                builder
                    .push("(title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR description ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR property_address ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Predicate::PublicOrOwnedBy(seller_id) => {
                builder
                    .push("(status = ANY(")
                    .push_bind(status_codes(&ListingStatus::PUBLIC))
                    .push(") OR seller_id = ")
                    .push_bind(*seller_id)
                    .push(")");
            }
        }
    }
}

/// Appends `WHERE p1 AND p2 ...`. An empty list adds nothing.
pub fn push_where(builder: &mut QueryBuilder<'static, Postgres>, predicates: &[Predicate]) {
    for (index, predicate) in predicates.iter().enumerate() {
        builder.push(if index == 0 { " WHERE " } else { " AND " });
        predicate.push_sql(builder);
    }
}

pub fn count_query(filter: &ListingFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM note_listings");
    push_where(&mut builder, &filter.predicates());
    builder
}

pub fn page_query(request: &SearchRequest) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT * FROM note_listings");
    push_where(&mut builder, &request.filter.predicates());

    let direction = match request.sort.order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    builder
        .push(" ORDER BY ")
        .push(request.sort.field.column())
        .push(" ")
        .push(direction)
        .push(" NULLS LAST, id ")
        .push(direction)
        .push(" LIMIT ")
        .push_bind(request.page.limit)
        .push(" OFFSET ")
        .push_bind(request.page.offset);
    builder
}

fn status_codes(statuses: &[ListingStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn push_scalar(builder: &mut QueryBuilder<'static, Postgres>, value: &Scalar) {
    match value {
        Scalar::Decimal(v) => builder.push_bind(v.clone()),
        Scalar::Integer(v) => builder.push_bind(*v),
        Scalar::Date(v) => builder.push_bind(*v),
    };
}

fn push_range<T: Clone>(
    predicates: &mut Vec<Predicate>,
    column: &'static str,
    range: &Range<T>,
    wrap: fn(T) -> Scalar,
) {
    if let Some(min) = &range.min {
        predicates.push(Predicate::AtLeast(column, wrap(min.clone())));
    }
    if let Some(max) = &range.max {
        predicates.push(Predicate::AtMost(column, wrap(max.clone())));
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn code(raw: &Option<String>) -> Option<String> {
    non_blank(raw.as_deref()).map(|value| normalize_code(&value))
}

fn parse_opt<T: FromStr>(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<T>, ValidationError> {
    match non_blank(raw.as_deref()) {
        None => Ok(None),
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|_| ValidationError::new(field, format!("invalid value '{}'", value))),
    }
}

fn parse_date(
    field: &'static str,
    raw: &Option<String>,
) -> Result<Option<NaiveDate>, ValidationError> {
    match non_blank(raw.as_deref()) {
        None => Ok(None),
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ValidationError::new(field, "must be a date formatted YYYY-MM-DD")),
    }
}

fn decimal_range(
    min: (&'static str, &Option<String>),
    max: (&'static str, &Option<String>),
) -> Result<Range<BigDecimal>, ValidationError> {
    Ok(Range {
        min: parse_opt(min.0, min.1)?,
        max: parse_opt(max.0, max.1)?,
    })
}

fn parse_list<T>(field: &'static str, raw: &Option<String>) -> Result<Vec<T>, ValidationError>
where
    T: FromStr + PartialEq,
{
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let mut values = Vec::new();
    for entry in raw.split(',').filter_map(|entry| non_blank(Some(entry))) {
        let value = normalize_code(&entry)
            .parse::<T>()
            .map_err(|_| ValidationError::new(field, format!("unknown value '{}'", entry)))?;
        if !values.contains(&value) {
            values.push(value);
        }
    }
    Ok(values)
}
