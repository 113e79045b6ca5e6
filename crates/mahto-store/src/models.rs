//! Domain model structs persisted in the document store.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a UI layer. Conversion to and from stored field maps lives
//! in [`crate::schema`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mahto_shared::{
    ConversationId, ListingKind, MessageId, PropertyCategory, PropertyId, UserId,
};

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

/// The `users/{id}` document: one record per authenticated identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    /// Display name shown in chats and listings.
    pub name: String,
    /// Raw phone number the account was registered with.
    pub phone: String,
    /// Phone-derived virtual email used as the sign-in name.
    pub email: String,
    /// Postal address, free text.
    pub address: String,
    /// Avatar image URI, if the user uploaded one.
    pub avatar: Option<String>,
    /// Last profile edit, ISO-8601.
    pub updated_at: Option<String>,
}

/// Partial profile edit. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.address.is_none()
            && self.avatar.is_none()
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// The `conversations/{id}` document: one thread per participant pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    /// Exactly two participant user ids, stored sorted.
    pub participants: Vec<UserId>,
    /// Denormalized text of the most recent message.
    pub last_message: String,
    /// Server-assigned timestamp of the most recent message.
    pub last_message_timestamp: Option<DateTime<Utc>>,
    /// Written as 0 at creation and never incremented; the read-tracking
    /// semantics were never finished upstream.
    pub unread_count: i64,
    /// Listing this thread was started from, if any.
    pub property_id: Option<PropertyId>,
    pub property_title: Option<String>,
}

impl Conversation {
    /// The participant that is not `me`, if `me` participates at all.
    pub fn counterpart(&self, me: &UserId) -> Option<&UserId> {
        if !self.participants.contains(me) {
            return None;
        }
        self.participants.iter().find(|p| *p != me)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A `conversations/{id}/messages/{id}` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub text: String,
    pub sender_id: UserId,
    /// Server-assigned; `None` while a local write is still pending.
    pub created_at: Option<DateTime<Utc>>,
    /// Written as false and never flipped; see `unread_count`.
    pub read: bool,
}

// ---------------------------------------------------------------------------
// Property listing
// ---------------------------------------------------------------------------

/// The `properties/{id}` document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyListing {
    pub id: PropertyId,
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    /// Free text as entered by the owner ("45 Lakh", "12000/month").
    pub price: String,
    /// Human-entered location string ("Ranchi, Jharkhand").
    pub location: String,
    pub category: PropertyCategory,
    pub listing_kind: ListingKind,
    /// Image URIs, at most five.
    pub images: Vec<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    /// Free text ("1500 sqft", "2 Acres").
    pub area: Option<String>,
    pub likes: i64,
    pub liked_by: Vec<UserId>,
    pub shares: i64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating a listing. The owner and counters are filled in by
/// the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: String,
    pub location: String,
    pub category: PropertyCategory,
    pub listing_kind: ListingKind,
    pub images: Vec<String>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area: Option<String>,
}

/// Partial listing edit. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub category: Option<PropertyCategory>,
    pub listing_kind: Option<ListingKind>,
    pub images: Option<Vec<String>>,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub area: Option<String>,
}
