pub mod access;
pub mod inquiries;
pub mod listings;
pub mod notifications;
pub mod workflow;

pub use access::AccessGate;
pub use inquiries::InquiryService;
pub use listings::ListingService;
pub use notifications::{
    LogNotifier, Notification, NotificationDispatcher, Notifier, WebhookNotifier,
};
pub use workflow::TransactionWorkflow;
