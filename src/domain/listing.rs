//! Listing lifecycle and attribute sets.

use super::Actor;

text_enum! {
    /// Review/sale state of a listing.
    pub enum ListingStatus {
        Draft => "draft",
        Pending => "pending",
        Active => "active",
        Sold => "sold",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum PropertyType {
        SingleFamily => "single_family",
        MultiFamily => "multi_family",
        Condo => "condo",
        Townhouse => "townhouse",
        Commercial => "commercial",
        Land => "land",
        MobileHome => "mobile_home",
        Other => "other",
    }
}

text_enum! {
    /// Payment history of the underlying loan.
    pub enum PerformanceStatus {
        Performing => "performing",
        SubPerforming => "sub_performing",
        NonPerforming => "non_performing",
        Reperforming => "reperforming",
    }
}

/// Who is allowed to drive a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAuthority {
    Seller,
    Admin,
    Workflow,
}

impl ListingStatus {
    /// Statuses only ever move forward along draft → pending → active → sold,
    /// with pending → rejected as the single branch.
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Draft, ListingStatus::Pending)
                | (ListingStatus::Pending, ListingStatus::Active)
                | (ListingStatus::Pending, ListingStatus::Rejected)
                | (ListingStatus::Active, ListingStatus::Sold)
        )
    }

    /// The party that owns a given transition.
    pub fn transition_authority(self, next: ListingStatus) -> Option<TransitionAuthority> {
        if !self.can_transition_to(next) {
            return None;
        }
        Some(match next {
            ListingStatus::Pending => TransitionAuthority::Seller,
            ListingStatus::Active | ListingStatus::Rejected => TransitionAuthority::Admin,
            ListingStatus::Sold => TransitionAuthority::Workflow,
            ListingStatus::Draft => return None,
        })
    }

    /// Statuses anyone may see. The rest are visible to the seller and admins.
    pub const PUBLIC: [ListingStatus; 2] = [ListingStatus::Active, ListingStatus::Sold];

    pub fn is_public(self) -> bool {
        Self::PUBLIC.contains(&self)
    }

    /// Listings stay editable by their seller until they are sold.
    pub fn is_editable(self) -> bool {
        !matches!(self, ListingStatus::Sold)
    }

    /// Active and sold listings carry buyer history and cannot be removed.
    pub fn is_deletable(self) -> bool {
        matches!(
            self,
            ListingStatus::Draft | ListingStatus::Pending | ListingStatus::Rejected
        )
    }
}

/// Checks a requested status change against the caller. Returns the reason on
/// refusal so handlers can tell "not allowed" from "not yours".
pub fn authorize_status_change(
    actor: &Actor,
    seller_id: uuid::Uuid,
    current: ListingStatus,
    next: ListingStatus,
) -> Result<(), StatusChangeRefusal> {
    match current.transition_authority(next) {
        None => Err(StatusChangeRefusal::InvalidTransition),
        Some(TransitionAuthority::Seller) if actor.is_or_admin(seller_id) => Ok(()),
        Some(TransitionAuthority::Admin) if actor.is_admin => Ok(()),
        Some(_) => Err(StatusChangeRefusal::NotPermitted),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChangeRefusal {
    InvalidTransition,
    NotPermitted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn forward_transitions_only() {
        use ListingStatus::*;

        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Sold));

        assert!(!Draft.can_transition_to(Active));
        assert!(!Draft.can_transition_to(Sold));
        assert!(!Active.can_transition_to(Pending));
        assert!(!Sold.can_transition_to(Active));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Active.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn every_status_pair_is_classified() {
        for from in ListingStatus::ALL {
            for to in ListingStatus::ALL {
                let allowed = from.can_transition_to(*to);
                assert_eq!(allowed, from.transition_authority(*to).is_some());
            }
        }
    }

    #[test]
    fn seller_submits_admin_reviews() {
        let seller = Uuid::new_v4();
        let owner = Actor::user(seller);
        let admin = Actor::admin(Uuid::new_v4());
        let other = Actor::user(Uuid::new_v4());

        assert!(
            authorize_status_change(&owner, seller, ListingStatus::Draft, ListingStatus::Pending)
                .is_ok()
        );
        assert_eq!(
            authorize_status_change(&other, seller, ListingStatus::Draft, ListingStatus::Pending),
            Err(StatusChangeRefusal::NotPermitted)
        );
        assert_eq!(
            authorize_status_change(&owner, seller, ListingStatus::Pending, ListingStatus::Active),
            Err(StatusChangeRefusal::NotPermitted)
        );
        assert!(
            authorize_status_change(&admin, seller, ListingStatus::Pending, ListingStatus::Active)
                .is_ok()
        );
        assert!(authorize_status_change(
            &admin,
            seller,
            ListingStatus::Pending,
            ListingStatus::Rejected
        )
        .is_ok());
        assert_eq!(
            authorize_status_change(&admin, seller, ListingStatus::Active, ListingStatus::Sold),
            Err(StatusChangeRefusal::NotPermitted)
        );
        assert_eq!(
            authorize_status_change(&admin, seller, ListingStatus::Sold, ListingStatus::Active),
            Err(StatusChangeRefusal::InvalidTransition)
        );
    }

    #[test]
    fn editability() {
        assert!(ListingStatus::Active.is_editable());
        assert!(!ListingStatus::Sold.is_editable());
        assert!(ListingStatus::Rejected.is_deletable());
        assert!(!ListingStatus::Active.is_deletable());
    }
}
