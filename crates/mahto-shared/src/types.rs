use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::VIRTUAL_EMAIL_DOMAIN;

/// Opaque user identifier assigned by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier (used by the in-memory identity backend).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Conversation document identifier.
///
/// Derived deterministically from the participant pair so that two sessions
/// starting the same conversation concurrently land on the same document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key for the unordered participant pair: the two ids joined in sorted
    /// order. `for_pair(a, b) == for_pair(b, a)` always holds.
    pub fn for_pair(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}__{}", lo.0, hi.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property listing document identifier (store-generated).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PropertyId(pub String);

impl PropertyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message document identifier (store-generated).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Property category shown on the browse screen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PropertyCategory {
    Home,
    Apartment,
    Villa,
    Commercial,
    Land,
}

impl PropertyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::Apartment => "Apartment",
            Self::Villa => "Villa",
            Self::Commercial => "Commercial",
            Self::Land => "Land",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Home" => Some(Self::Home),
            "Apartment" => Some(Self::Apartment),
            "Villa" => Some(Self::Villa),
            "Commercial" => Some(Self::Commercial),
            "Land" => Some(Self::Land),
            _ => None,
        }
    }
}

impl std::fmt::Display for PropertyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a listing is offered for sale or for rent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ListingKind {
    Sell,
    Rent,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sell => "Sell",
            Self::Rent => "Rent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Sell" => Some(Self::Sell),
            "Rent" => Some(Self::Rent),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Build the phone-derived virtual email used as the sign-in name:
/// `{countryCode}{phone}@mahto.app`.
pub fn virtual_email(country_code: &str, phone: &str) -> String {
    let cc = country_code.trim().trim_start_matches('+');
    format!("{}{}@{}", cc, phone.trim(), VIRTUAL_EMAIL_DOMAIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_key_is_order_independent() {
        let a = UserId::new("u1");
        let b = UserId::new("u2");
        assert_eq!(ConversationId::for_pair(&a, &b), ConversationId::for_pair(&b, &a));
        assert_eq!(ConversationId::for_pair(&a, &b).as_str(), "u1__u2");
    }

    #[test]
    fn virtual_email_strips_plus_prefix() {
        assert_eq!(virtual_email("+91", "9876543210"), "919876543210@mahto.app");
        assert_eq!(virtual_email("91", " 9876543210 "), "919876543210@mahto.app");
    }

    #[test]
    fn category_round_trip() {
        for c in [
            PropertyCategory::Home,
            PropertyCategory::Apartment,
            PropertyCategory::Villa,
            PropertyCategory::Commercial,
            PropertyCategory::Land,
        ] {
            assert_eq!(PropertyCategory::parse(c.as_str()), Some(c));
        }
        assert_eq!(PropertyCategory::parse("Castle"), None);
    }
}
