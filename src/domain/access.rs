//! Access request types and their answer window.

use chrono::{DateTime, Duration, Utc};

/// How long a fresh access request stays answerable.
pub const DEFAULT_ACCESS_REQUEST_TTL_HOURS: i64 = 48;

text_enum! {
    pub enum AccessRequestType {
        Contact => "contact",
        Documents => "documents",
        Full => "full",
    }
}

text_enum! {
    pub enum AccessRequestStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Expired => "expired",
    }
}

impl AccessRequestStatus {
    /// Pending and not yet past `expires_at`.
    pub fn is_active(self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self == AccessRequestStatus::Pending && expires_at > now
    }

    /// The listing's seller answers a pending request with one of these.
    pub fn is_review_outcome(self) -> bool {
        matches!(
            self,
            AccessRequestStatus::Approved | AccessRequestStatus::Rejected
        )
    }
}

pub fn access_expiry(created_at: DateTime<Utc>, ttl_hours: i64) -> DateTime<Utc> {
    created_at + Duration::hours(ttl_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_forty_eight_hours_by_default() {
        let now = Utc::now();
        let expires = access_expiry(now, DEFAULT_ACCESS_REQUEST_TTL_HOURS);
        assert_eq!(expires - now, Duration::hours(48));
    }

    #[test]
    fn active_means_pending_and_unexpired() {
        let now = Utc::now();
        let later = now + Duration::hours(1);
        let earlier = now - Duration::seconds(1);

        assert!(AccessRequestStatus::Pending.is_active(later, now));
        assert!(!AccessRequestStatus::Pending.is_active(earlier, now));
        assert!(!AccessRequestStatus::Pending.is_active(now, now));
        assert!(!AccessRequestStatus::Approved.is_active(later, now));
    }

    #[test]
    fn review_outcomes() {
        assert!(AccessRequestStatus::Approved.is_review_outcome());
        assert!(AccessRequestStatus::Rejected.is_review_outcome());
        assert!(!AccessRequestStatus::Expired.is_review_outcome());
        assert!(!AccessRequestStatus::Pending.is_review_outcome());
    }
}
