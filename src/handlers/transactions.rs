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
use crate::services::workflow::{
    CreateFile, CreateNote, CreateTask, CreateTransaction, UpdateTransaction,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction found", body = Transaction),
        (status = 403, description = "Not a party to the transaction"),
        (status = 404, description = "Transaction not found")
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.workflow.get(&actor, id).await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/user/{user_id}",
    params(("user_id" = Uuid, Path, description = "Buyer or seller user ID")),
    responses(
        (status = 200, description = "Transactions the user is party to", body = [Transaction])
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn transactions_for_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(user_id) = user_id?;
    Ok(ApiResponse::ok(state.workflow.list_for_user(&actor, user_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions",
    request_body = CreateTransaction,
    responses(
        (status = 201, description = "Transaction opened in the initial phase", body = Transaction),
        (status = 409, description = "Listing is not active")
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    payload: Result<Json<CreateTransaction>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.workflow.create(&actor, input).await?))
}

#[utoipa::path(
    put,
    path = "/api/transactions/{id}",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = UpdateTransaction,
    responses(
        (status = 200, description = "Transaction updated", body = Transaction),
        (status = 409, description = "Transaction already completed")
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn update_transaction(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateTransaction>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(changes) = payload?;
    Ok(ApiResponse::ok(state.workflow.update(&actor, id, changes).await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{id}/tasks",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses((status = 200, description = "Tasks of every phase", body = [TransactionTask])),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.workflow.list_tasks(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/tasks",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = CreateTask,
    responses(
        (status = 201, description = "Task added", body = TransactionTask),
        (status = 409, description = "Phase already passed or takes no tasks")
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn add_task(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateTask>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.workflow.add_task(&actor, id, input).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/tasks/{task_id}/complete",
    params(
        ("id" = Uuid, Path, description = "Transaction ID"),
        ("task_id" = Uuid, Path, description = "Task ID")
    ),
    responses(
        (
            status = 200,
            description = "Task completed; the phase may have advanced",
            body = TaskCompletion
        ),
        (status = 403, description = "Not allowed to complete this task"),
        (status = 409, description = "Task already completed or not in the current phase")
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn complete_task(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    ids: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path((id, task_id)) = ids?;
    Ok(ApiResponse::ok(state.workflow.complete_task(&actor, id, task_id).await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{id}/files",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Files visible to the caller", body = [TransactionFile])
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn list_files(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.workflow.list_files(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/files",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = CreateFile,
    responses((status = 201, description = "File attached", body = TransactionFile)),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn add_file(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateFile>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.workflow.add_file(&actor, id, input).await?))
}

#[utoipa::path(
    get,
    path = "/api/transactions/{id}/timeline",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (
            status = 200,
            description = "Events in the order they were recorded",
            body = [TimelineEvent]
        )
    ),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn timeline(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    Ok(ApiResponse::ok(state.workflow.timeline(&actor, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/transactions/{id}/timeline",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    request_body = CreateNote,
    responses((status = 201, description = "Note recorded", body = TimelineEvent)),
    security(("bearer" = [])),
    tag = "Transactions"
)]
pub async fn add_note(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<CreateNote>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Path(id) = id?;
    let Json(input) = payload?;
    Ok(ApiResponse::created(state.workflow.add_note(&actor, id, input).await?))
}
