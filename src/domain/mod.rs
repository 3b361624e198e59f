//! Marketplace domain rules.
//! Framework-agnostic: status enums, their allowed transitions, and the
//! authorization facts the services check against.

use thiserror::Error;
use uuid::Uuid;

/// A stored or supplied value that is not a member of a closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed string-backed enum. Values are stored as TEXT and
/// serialized as the same lower-case strings.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, utoipa::ToSchema,
        )]
        $vis enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::domain::UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::domain::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::domain::UnknownVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

pub mod access;
pub mod inquiry;
pub mod listing;
pub mod transaction;

pub use access::{AccessRequestStatus, AccessRequestType};
pub use inquiry::InquiryStatus;
pub use listing::{ListingStatus, PerformanceStatus, PropertyType};
pub use transaction::{FileCategory, Phase, TaskStatus, TimelineEventType, TransactionStatus};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    /// True for the given user or any admin.
    pub fn is_or_admin(&self, user_id: Uuid) -> bool {
        self.is_admin || self.user_id == user_id
    }

    /// True for either party of a deal or any admin.
    pub fn is_party_or_admin(&self, buyer_id: Uuid, seller_id: Uuid) -> bool {
        self.is_admin || self.user_id == buyer_id || self.user_id == seller_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_enum_round_trips_through_strings() {
        for status in ListingStatus::ALL {
            let parsed: ListingStatus = status.as_str().parse().unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!(
            "bogus".parse::<ListingStatus>().unwrap_err(),
            UnknownVariant {
                kind: "ListingStatus",
                value: "bogus".to_string()
            }
        );
    }

    #[test]
    fn text_enum_serializes_as_stored_text() {
        let json = serde_json::to_string(&PropertyType::SingleFamily).unwrap();
        assert_eq!(json, "\"single_family\"");
        let back: InquiryStatus = serde_json::from_str("\"countered\"").unwrap();
        assert_eq!(back, InquiryStatus::Countered);
    }

    #[test]
    fn actor_checks() {
        let buyer = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let stranger = Actor::user(Uuid::new_v4());

        assert!(Actor::user(buyer).is_party_or_admin(buyer, seller));
        assert!(Actor::user(seller).is_party_or_admin(buyer, seller));
        assert!(!stranger.is_party_or_admin(buyer, seller));
        assert!(Actor::admin(Uuid::new_v4()).is_party_or_admin(buyer, seller));
        assert!(!stranger.is_or_admin(buyer));
    }
}
