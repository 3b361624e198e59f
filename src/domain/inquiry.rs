//! Inquiry status lifecycle.

text_enum! {
    pub enum InquiryStatus {
        Pending => "pending",
        Accepted => "accepted",
        Rejected => "rejected",
        Countered => "countered",
        Withdrawn => "withdrawn",
        Expired => "expired",
    }
}

impl InquiryStatus {
    /// Statuses the seller may answer with.
    pub const RESPONSES: &'static [InquiryStatus] = &[
        InquiryStatus::Accepted,
        InquiryStatus::Rejected,
        InquiryStatus::Countered,
    ];

    /// A countered inquiry stays open for another response.
    pub fn is_open(self) -> bool {
        matches!(self, InquiryStatus::Pending | InquiryStatus::Countered)
    }

    pub fn is_response(self) -> bool {
        Self::RESPONSES.contains(&self)
    }

    /// `responded_at` is stamped exactly when entering one of these.
    pub fn stamps_response_time(self) -> bool {
        matches!(self, InquiryStatus::Accepted | InquiryStatus::Rejected)
    }

    pub fn can_withdraw(self) -> bool {
        self.is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_statuses() {
        assert!(InquiryStatus::Pending.is_open());
        assert!(InquiryStatus::Countered.is_open());
        for closed in [
            InquiryStatus::Accepted,
            InquiryStatus::Rejected,
            InquiryStatus::Withdrawn,
            InquiryStatus::Expired,
        ] {
            assert!(!closed.is_open());
            assert!(!closed.can_withdraw());
        }
    }

    #[test]
    fn only_final_answers_stamp_response_time() {
        assert!(InquiryStatus::Accepted.stamps_response_time());
        assert!(InquiryStatus::Rejected.stamps_response_time());
        assert!(!InquiryStatus::Countered.stamps_response_time());
        assert!(!InquiryStatus::Pending.stamps_response_time());
    }

    #[test]
    fn seller_responses() {
        assert!(InquiryStatus::Countered.is_response());
        assert!(!InquiryStatus::Withdrawn.is_response());
        assert!(!InquiryStatus::Pending.is_response());
        assert!(!InquiryStatus::Expired.is_response());
    }
}
