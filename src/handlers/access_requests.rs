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
use crate::services::access::{CreateAccessRequest, ReviewAccessRequest};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/request-access",
    request_body = CreateAccessRequest,
    responses(
        (status = 201, description = "Access requested", body = AccessRequest),
        (status = 409, description = "An active request already exists")
    ),
    security(("bearer" = [])),
    tag = "Access"
)]
pub async fn request_access(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<CreateAccessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.access.request(&actor, input).await?))
}

#[utoipa::path(
    get,
    path = "/api/access-requests",
    responses(
        (
            status = 200,
            description = "Requests made or received by the caller",
            body = [AccessRequest]
        )
    ),
    security(("bearer" = [])),
    tag = "Access"
)]
pub async fn list_access_requests(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(ApiResponse::ok(state.access.list(&actor).await?))
}

#[utoipa::path(
    put,
    path = "/api/access-requests/{id}",
    params(("id" = Uuid, Path, description = "Access request ID")),
    request_body = ReviewAccessRequest,
    responses(
        (status = 200, description = "Request reviewed", body = AccessRequest),
        (status = 400, description = "Status must be approved or rejected"),
        (status = 409, description = "Request expired or already reviewed")
    ),
    security(("bearer" = [])),
    tag = "Access"
)]
pub async fn review_access_request(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<ReviewAccessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(ReviewAccessRequest { status }) = payload?;
    Ok(ApiResponse::ok(state.access.review(&actor, id, status).await?))
}
