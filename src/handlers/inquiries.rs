use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::middleware::auth::AuthUser;
use crate::services::inquiries::{CreateInquiry, RespondInquiry, UpdateInquiry};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/inquiries/listing/{listing_id}",
    params(("listing_id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Inquiries on the listing", body = [Inquiry]),
        (status = 403, description = "Only the seller can list them")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn inquiries_by_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    listing_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(listing_id) = listing_id?;
    Ok(ApiResponse::ok(state.inquiries.list_by_listing(&actor, listing_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/inquiries/buyer/{buyer_id}",
    params(("buyer_id" = Uuid, Path, description = "Buyer user ID")),
    responses((status = 200, description = "Inquiries sent by the buyer", body = [Inquiry])),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn inquiries_by_buyer(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    buyer_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(buyer_id) = buyer_id?;
    Ok(ApiResponse::ok(state.inquiries.list_by_buyer(&actor, buyer_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/inquiries/seller/{seller_id}",
    params(("seller_id" = Uuid, Path, description = "Seller user ID")),
    responses((status = 200, description = "Inquiries received by the seller", body = [Inquiry])),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn inquiries_by_seller(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    seller_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(seller_id) = seller_id?;
    Ok(ApiResponse::ok(state.inquiries.list_by_seller(&actor, seller_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/inquiries/{id}",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    responses(
        (status = 200, description = "Inquiry found", body = Inquiry),
        (status = 404, description = "Inquiry not found")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn get_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.inquiries.get(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/inquiries",
    request_body = CreateInquiry,
    responses(
        (status = 201, description = "Inquiry sent", body = Inquiry),
        (status = 403, description = "Sellers cannot inquire on their own listing"),
        (status = 409, description = "Listing is not active")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn create_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<CreateInquiry>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.inquiries.create(&actor, input).await?))
}

#[utoipa::path(
    put,
    path = "/api/inquiries/{id}",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    request_body = UpdateInquiry,
    responses(
        (status = 200, description = "Inquiry updated", body = Inquiry),
        (status = 409, description = "Inquiry is no longer pending")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn update_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateInquiry>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(changes) = payload?;
    Ok(ApiResponse::ok(state.inquiries.update(&actor, id, changes).await?))
}

#[utoipa::path(
    delete,
    path = "/api/inquiries/{id}",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    responses((status = 200, description = "Inquiry deleted")),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn delete_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    state.inquiries.delete(&actor, id).await?;
    Ok(ApiResponse::message("Inquiry deleted"))
}

#[utoipa::path(
    post,
    path = "/api/inquiries/{id}/respond",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    request_body = RespondInquiry,
    responses(
        (
            status = 200,
            description = "Response recorded; accepting opens a transaction",
            body = InquiryResponse
        ),
        (status = 403, description = "Only the listing's seller can respond"),
        (status = 409, description = "Inquiry expired or already answered")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn respond_to_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<RespondInquiry>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    Ok(ApiResponse::ok(state.inquiries.respond(&actor, id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/inquiries/{id}/withdraw",
    params(("id" = Uuid, Path, description = "Inquiry ID")),
    responses(
        (status = 200, description = "Inquiry withdrawn", body = Inquiry),
        (status = 409, description = "Inquiry already answered")
    ),
    security(("bearer" = [])),
    tag = "Inquiries"
)]
pub async fn withdraw_inquiry(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.inquiries.withdraw(&actor, id).await?))
}
