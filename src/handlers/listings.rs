use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;
use crate::handlers::ApiResponse;
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::search::{SearchParams, SearchRequest};
use crate::services::listings::{ListingInput, ListingUpdate};
use crate::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectListing {
    pub review_note: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/note-listings",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching page and total count", body = ListingPage),
        (status = 400, description = "Malformed filter value")
    ),
    tag = "Listings"
)]
pub async fn search_listings(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let request = SearchRequest::from_params(&params)?.visible_to(viewer.as_ref());
    let page = state.listings.search(&request).await?;
    Ok(ApiResponse::ok(page))
}

#[utoipa::path(
    get,
    path = "/api/note-listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing found", body = Listing),
        (status = 404, description = "Listing not found")
    ),
    tag = "Listings"
)]
pub async fn get_listing(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let listing = state.listings.get(viewer.as_ref(), id).await?;
    Ok(ApiResponse::ok(listing))
}

#[utoipa::path(
    get,
    path = "/api/note-listings/seller/{seller_id}",
    params(("seller_id" = Uuid, Path, description = "Seller user ID")),
    responses((status = 200, description = "Listings of the seller", body = [Listing])),
    tag = "Listings"
)]
pub async fn listings_by_seller(
    State(state): State<AppState>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    seller_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(seller_id) = seller_id?;
    let listings = state.listings.by_seller(viewer.as_ref(), seller_id).await?;
    Ok(ApiResponse::ok(listings))
}

#[utoipa::path(
    post,
    path = "/api/note-listings",
    request_body = ListingInput,
    responses(
        (status = 201, description = "Listing created as a draft", body = Listing),
        (status = 400, description = "Invalid listing"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn create_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<ListingInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    let listing = state.listings.create(&actor, input).await?;
    Ok(ApiResponse::created(listing))
}

#[utoipa::path(
    put,
    path = "/api/note-listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = ListingUpdate,
    responses(
        (status = 200, description = "Listing updated", body = Listing),
        (status = 403, description = "Not the seller"),
        (status = 409, description = "Listing can no longer be edited")
    ),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn update_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ListingUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let listing = state.listings.update(&actor, id, changes).await?;
    Ok(ApiResponse::ok(listing))
}

#[utoipa::path(
    delete,
    path = "/api/note-listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing deleted"),
        (status = 409, description = "Active or sold listings cannot be deleted")
    ),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn delete_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    state.listings.delete(&actor, id).await?;
    Ok(ApiResponse::message("Listing deleted"))
}

#[utoipa::path(
    post,
    path = "/api/note-listings/{id}/submit",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses((status = 200, description = "Listing submitted for review", body = Listing)),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn submit_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.listings.submit(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/note-listings/{id}/approve",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing is now active", body = Listing),
        (status = 403, description = "Admins only")
    ),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn approve_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.listings.approve(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/note-listings/{id}/reject",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body(content = RejectListing, description = "Optional note for the seller"),
    responses(
        (status = 200, description = "Listing rejected", body = Listing),
        (status = 403, description = "Admins only")
    ),
    security(("bearer" = [])),
    tag = "Listings"
)]
pub async fn reject_listing(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Option<Json<RejectListing>>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let note = payload.and_then(|Json(body)| body.review_note);
    Ok(ApiResponse::ok(state.listings.reject(&actor, id, note).await?))
}
