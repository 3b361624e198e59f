pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod search;
pub mod services;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::Config;
use crate::handlers::{access_requests, inquiries, listings, transactions};
use crate::middleware::request_logger::{request_logger_middleware, RequestLogSettings};
use crate::services::{
    AccessGate, InquiryService, ListingService, NotificationDispatcher, TransactionWorkflow,
};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub listings: ListingService,
    pub inquiries: InquiryService,
    pub access: AccessGate,
    pub workflow: TransactionWorkflow,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Arc<Config>, notifier: NotificationDispatcher) -> Self {
        Self {
            listings: ListingService::new(db.clone(), notifier.clone()),
            inquiries: InquiryService::new(db.clone(), notifier.clone(), config.inquiry_ttl_days),
            access: AccessGate::new(db.clone(), notifier.clone(), config.access_request_ttl_hours),
            workflow: TransactionWorkflow::new(db.clone(), notifier),
            db,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);
    let log_settings = RequestLogSettings {
        log_body: state.config.log_request_body,
    };

    let listing_routes = Router::new()
        .route("/", get(listings::search_listings).post(listings::create_listing))
        .route("/seller/:seller_id", get(listings::listings_by_seller))
        .route(
            "/:id",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/:id/submit", post(listings::submit_listing))
        .route("/:id/approve", post(listings::approve_listing))
        .route("/:id/reject", post(listings::reject_listing));

    let inquiry_routes = Router::new()
        .route("/", post(inquiries::create_inquiry))
        .route("/listing/:listing_id", get(inquiries::inquiries_by_listing))
        .route("/buyer/:buyer_id", get(inquiries::inquiries_by_buyer))
        .route("/seller/:seller_id", get(inquiries::inquiries_by_seller))
        .route(
            "/:id",
            get(inquiries::get_inquiry)
                .put(inquiries::update_inquiry)
                .delete(inquiries::delete_inquiry),
        )
        .route("/:id/respond", post(inquiries::respond_to_inquiry))
        .route("/:id/withdraw", post(inquiries::withdraw_inquiry));

    let transaction_routes = Router::new()
        .route("/", post(transactions::create_transaction))
        .route("/user/:user_id", get(transactions::transactions_for_user))
        .route(
            "/:id",
            get(transactions::get_transaction).put(transactions::update_transaction),
        )
        .route(
            "/:id/tasks",
            get(transactions::list_tasks).post(transactions::add_task),
        )
        .route("/:id/tasks/:task_id/complete", post(transactions::complete_task))
        .route(
            "/:id/files",
            get(transactions::list_files).post(transactions::add_file),
        )
        .route(
            "/:id/timeline",
            get(transactions::timeline).post(transactions::add_note),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .nest("/api/note-listings", listing_routes)
        .nest("/api/inquiries", inquiry_routes)
        .nest("/api/transactions", transaction_routes)
        .route("/api/request-access", post(access_requests::request_access))
        .route("/api/access-requests", get(access_requests::list_access_requests))
        .route("/api/access-requests/:id", put(access_requests::review_access_request))
        .layer(axum_middleware::from_fn_with_state(
            log_settings,
            request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}
