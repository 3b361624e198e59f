use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::db::models::{
    AccessRequest, Inquiry, Listing, OptionalPerformance, TimelineEvent, Transaction,
    TransactionFile, TransactionTask,
};
use crate::domain::{
    AccessRequestStatus, AccessRequestType, FileCategory, InquiryStatus, ListingStatus,
    PerformanceStatus, Phase, PropertyType, TaskStatus, TimelineEventType, TransactionStatus,
};
use crate::handlers::{self, access_requests, inquiries, listings, transactions};
use crate::services::access::{CreateAccessRequest, ReviewAccessRequest};
use crate::services::inquiries::{CreateInquiry, InquiryResponse, RespondInquiry, UpdateInquiry};
use crate::services::listings::{ListingInput, ListingPage, ListingUpdate};
use crate::services::workflow::{
    CreateFile, CreateNote, CreateTask, CreateTransaction, TaskCompletion, UpdateTransaction,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Note Marketplace API",
        description = "Listings, inquiries, access grants and closing workflow for mortgage notes"
    ),
    paths(
        handlers::health,
        listings::search_listings,
        listings::get_listing,
        listings::listings_by_seller,
        listings::create_listing,
        listings::update_listing,
        listings::delete_listing,
        listings::submit_listing,
        listings::approve_listing,
        listings::reject_listing,
        inquiries::inquiries_by_listing,
        inquiries::inquiries_by_buyer,
        inquiries::inquiries_by_seller,
        inquiries::get_inquiry,
        inquiries::create_inquiry,
        inquiries::update_inquiry,
        inquiries::delete_inquiry,
        inquiries::respond_to_inquiry,
        inquiries::withdraw_inquiry,
        access_requests::request_access,
        access_requests::list_access_requests,
        access_requests::review_access_request,
        transactions::get_transaction,
        transactions::transactions_for_user,
        transactions::create_transaction,
        transactions::update_transaction,
        transactions::list_tasks,
        transactions::add_task,
        transactions::complete_task,
        transactions::list_files,
        transactions::add_file,
        transactions::timeline,
        transactions::add_note,
    ),
    components(schemas(
        handlers::HealthStatus,
        handlers::DbPoolStats,
        Listing,
        OptionalPerformance,
        ListingInput,
        ListingUpdate,
        ListingPage,
        listings::RejectListing,
        Inquiry,
        CreateInquiry,
        UpdateInquiry,
        RespondInquiry,
        InquiryResponse,
        AccessRequest,
        CreateAccessRequest,
        ReviewAccessRequest,
        Transaction,
        TransactionTask,
        TransactionFile,
        TimelineEvent,
        CreateTransaction,
        UpdateTransaction,
        CreateTask,
        CreateFile,
        CreateNote,
        TaskCompletion,
        ListingStatus,
        PropertyType,
        PerformanceStatus,
        InquiryStatus,
        AccessRequestType,
        AccessRequestStatus,
        TransactionStatus,
        Phase,
        TaskStatus,
        FileCategory,
        TimelineEventType,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Health"),
        (name = "Listings", description = "Note listings and their review lifecycle"),
        (name = "Inquiries", description = "Buyer inquiries and seller responses"),
        (name = "Access", description = "Time-boxed contact and document access"),
        (
            name = "Transactions",
            description = "Closing workflow with phases, tasks, files and timeline"
        )
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/note-listings",
            "/api/note-listings/{id}/reject",
            "/api/inquiries/{id}/respond",
            "/api/request-access",
            "/api/transactions/{id}/tasks/{task_id}/complete",
            "/api/transactions/{id}/timeline",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
