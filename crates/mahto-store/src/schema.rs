//! Collection names and the field-map ↔ model conversion layer.
//!
//! Field names follow the persisted document shapes
//! (`lastMessageTimestamp`, `likedBy`, ISO-8601 `updatedAt`, ...).
//! Reads are lenient for display strings (missing text degrades to an
//! empty default) and strict for fields the data model cannot do without
//! (participants, sender, owner, category).

use chrono::Utc;

use mahto_shared::{
    ConversationId, ListingKind, MessageId, PropertyCategory, PropertyId, UserId,
};

use crate::error::{Result, StoreError};
use crate::models::{
    ChatMessage, Conversation, ListingDraft, ListingPatch, ProfilePatch, PropertyListing,
    UserProfile,
};
use crate::value::{Document, FieldWrite, Value, WriteFields};

/// `users` collection.
pub const USERS: &str = "users";
/// `conversations` collection.
pub const CONVERSATIONS: &str = "conversations";
/// `properties` collection.
pub const PROPERTIES: &str = "properties";

/// Path of one conversation's message subcollection.
pub fn messages_path(conversation: &ConversationId) -> String {
    format!("{CONVERSATIONS}/{conversation}/messages")
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn str_or_default(doc: &Document, field: &str) -> String {
    doc.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn opt_str(doc: &Document, field: &str) -> Option<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn req_str(doc: &Document, field: &str) -> Result<String> {
    doc.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| StoreError::Schema(format!("{}: missing string field `{field}`", doc.id)))
}

fn i64_or_zero(doc: &Document, field: &str) -> i64 {
    doc.get(field).and_then(Value::as_i64).unwrap_or(0)
}

fn string_array(doc: &Document, field: &str) -> Vec<String> {
    doc.get(field)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn set(v: impl Into<Value>) -> FieldWrite {
    FieldWrite::Set(v.into())
}

// ---------------------------------------------------------------------------
// User profile
// ---------------------------------------------------------------------------

pub fn user_profile_from_doc(doc: &Document) -> UserProfile {
    UserProfile {
        id: UserId::new(doc.id.clone()),
        name: str_or_default(doc, "name"),
        phone: str_or_default(doc, "phone"),
        email: str_or_default(doc, "email"),
        address: str_or_default(doc, "address"),
        avatar: opt_str(doc, "image"),
        updated_at: opt_str(doc, "updatedAt"),
    }
}

/// Writes seeding a fresh `users/{uid}` document at sign-up.
pub fn new_user_writes(name: &str, phone: &str, email: &str) -> WriteFields {
    let mut w = WriteFields::new();
    w.insert("name".into(), set(name));
    w.insert("phone".into(), set(phone));
    w.insert("email".into(), set(email));
    w.insert("address".into(), set(""));
    w.insert("image".into(), set(Value::Null));
    w.insert("updatedAt".into(), set(Utc::now().to_rfc3339()));
    w
}

/// Merge writes for a profile edit; only touched fields are written.
pub fn profile_patch_writes(patch: &ProfilePatch) -> WriteFields {
    let mut w = WriteFields::new();
    if let Some(name) = &patch.name {
        w.insert("name".into(), set(name.as_str()));
    }
    if let Some(phone) = &patch.phone {
        w.insert("phone".into(), set(phone.as_str()));
    }
    if let Some(address) = &patch.address {
        w.insert("address".into(), set(address.as_str()));
    }
    if let Some(avatar) = &patch.avatar {
        w.insert("image".into(), set(avatar.as_str()));
    }
    w.insert("updatedAt".into(), set(Utc::now().to_rfc3339()));
    w
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

pub fn conversation_from_doc(doc: &Document) -> Result<Conversation> {
    let participants: Vec<UserId> = doc
        .get("participants")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(UserId::new)
                .collect()
        })
        .unwrap_or_default();
    if participants.len() != 2 {
        return Err(StoreError::Schema(format!(
            "{}: expected 2 participants, found {}",
            doc.id,
            participants.len()
        )));
    }

    Ok(Conversation {
        id: ConversationId::new(doc.id.clone()),
        participants,
        last_message: str_or_default(doc, "lastMessage"),
        last_message_timestamp: doc
            .get("lastMessageTimestamp")
            .and_then(Value::as_timestamp),
        unread_count: i64_or_zero(doc, "unreadCount"),
        property_id: opt_str(doc, "propertyId").map(PropertyId::new),
        property_title: opt_str(doc, "propertyTitle"),
    })
}

/// Writes for a fresh conversation document. Participants are stored
/// sorted, matching the deterministic document key.
pub fn new_conversation_writes(
    a: &UserId,
    b: &UserId,
    property_id: Option<&PropertyId>,
    property_title: Option<&str>,
) -> WriteFields {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut w = WriteFields::new();
    w.insert(
        "participants".into(),
        set(vec![Value::from(lo.as_str()), Value::from(hi.as_str())]),
    );
    w.insert("lastMessage".into(), set(""));
    w.insert("lastMessageTimestamp".into(), FieldWrite::ServerTime);
    w.insert("unreadCount".into(), set(0i64));
    w.insert(
        "propertyId".into(),
        set(property_id.map(|p| p.as_str().to_string())),
    );
    w.insert(
        "propertyTitle".into(),
        set(property_title.map(str::to_string)),
    );
    w
}

/// Writes refreshing the denormalized conversation summary after a send.
pub fn conversation_summary_writes(text: &str) -> WriteFields {
    let mut w = WriteFields::new();
    w.insert("lastMessage".into(), set(text));
    w.insert("lastMessageTimestamp".into(), FieldWrite::ServerTime);
    w
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

pub fn message_from_doc(doc: &Document) -> Result<ChatMessage> {
    Ok(ChatMessage {
        id: MessageId::new(doc.id.clone()),
        text: str_or_default(doc, "text"),
        sender_id: UserId::new(req_str(doc, "senderId")?),
        created_at: doc.get("createdAt").and_then(Value::as_timestamp),
        read: doc.get("read").and_then(Value::as_bool).unwrap_or(false),
    })
}

pub fn new_message_writes(text: &str, sender: &UserId) -> WriteFields {
    let mut w = WriteFields::new();
    w.insert("text".into(), set(text));
    w.insert("senderId".into(), set(sender.as_str()));
    w.insert("createdAt".into(), FieldWrite::ServerTime);
    w.insert("read".into(), set(false));
    w
}

// ---------------------------------------------------------------------------
// Property listing
// ---------------------------------------------------------------------------

pub fn listing_from_doc(doc: &Document) -> Result<PropertyListing> {
    let category_str = req_str(doc, "category")?;
    let category = PropertyCategory::parse(&category_str).ok_or_else(|| {
        StoreError::Schema(format!("{}: unknown category `{category_str}`", doc.id))
    })?;
    let kind_str = req_str(doc, "listingType")?;
    let listing_kind = ListingKind::parse(&kind_str).ok_or_else(|| {
        StoreError::Schema(format!("{}: unknown listing type `{kind_str}`", doc.id))
    })?;

    Ok(PropertyListing {
        id: PropertyId::new(doc.id.clone()),
        owner_id: UserId::new(req_str(doc, "ownerId")?),
        title: str_or_default(doc, "title"),
        description: str_or_default(doc, "description"),
        price: str_or_default(doc, "price"),
        location: str_or_default(doc, "location"),
        category,
        listing_kind,
        images: string_array(doc, "images"),
        bedrooms: doc.get("bedrooms").and_then(Value::as_i64),
        bathrooms: doc.get("bathrooms").and_then(Value::as_i64),
        area: opt_str(doc, "area"),
        likes: i64_or_zero(doc, "likes"),
        liked_by: doc
            .get("likedBy")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(UserId::new)
                    .collect()
            })
            .unwrap_or_default(),
        shares: i64_or_zero(doc, "shares"),
        created_at: doc.get("createdAt").and_then(Value::as_timestamp),
    })
}

pub fn new_listing_writes(draft: &ListingDraft, owner: &UserId) -> WriteFields {
    let mut w = WriteFields::new();
    w.insert("ownerId".into(), set(owner.as_str()));
    w.insert("title".into(), set(draft.title.as_str()));
    w.insert("description".into(), set(draft.description.as_str()));
    w.insert("price".into(), set(draft.price.as_str()));
    w.insert("location".into(), set(draft.location.as_str()));
    w.insert("category".into(), set(draft.category.as_str()));
    w.insert("listingType".into(), set(draft.listing_kind.as_str()));
    w.insert(
        "images".into(),
        set(draft
            .images
            .iter()
            .map(|s| Value::from(s.as_str()))
            .collect::<Vec<_>>()),
    );
    w.insert("bedrooms".into(), set(draft.bedrooms));
    w.insert("bathrooms".into(), set(draft.bathrooms));
    w.insert("area".into(), set(draft.area.clone()));
    w.insert("likes".into(), set(0i64));
    w.insert("likedBy".into(), set(Vec::<Value>::new()));
    w.insert("shares".into(), set(0i64));
    w.insert("createdAt".into(), FieldWrite::ServerTime);
    w
}

pub fn listing_patch_writes(patch: &ListingPatch) -> WriteFields {
    let mut w = WriteFields::new();
    if let Some(title) = &patch.title {
        w.insert("title".into(), set(title.as_str()));
    }
    if let Some(description) = &patch.description {
        w.insert("description".into(), set(description.as_str()));
    }
    if let Some(price) = &patch.price {
        w.insert("price".into(), set(price.as_str()));
    }
    if let Some(location) = &patch.location {
        w.insert("location".into(), set(location.as_str()));
    }
    if let Some(category) = patch.category {
        w.insert("category".into(), set(category.as_str()));
    }
    if let Some(kind) = patch.listing_kind {
        w.insert("listingType".into(), set(kind.as_str()));
    }
    if let Some(images) = &patch.images {
        w.insert(
            "images".into(),
            set(images
                .iter()
                .map(|s| Value::from(s.as_str()))
                .collect::<Vec<_>>()),
        );
    }
    if let Some(n) = patch.bedrooms {
        w.insert("bedrooms".into(), set(n));
    }
    if let Some(n) = patch.bathrooms {
        w.insert("bathrooms".into(), set(n));
    }
    if let Some(area) = &patch.area {
        w.insert("area".into(), set(area.as_str()));
    }
    w
}

/// Favourite toggle: membership in `likedBy` plus the matching counter
/// nudge, in one merge write.
pub fn favorite_writes(user: &UserId, favorited: bool) -> WriteFields {
    let mut w = WriteFields::new();
    if favorited {
        w.insert(
            "likedBy".into(),
            FieldWrite::ArrayUnion(vec![Value::from(user.as_str())]),
        );
        w.insert("likes".into(), FieldWrite::Increment(1));
    } else {
        w.insert(
            "likedBy".into(),
            FieldWrite::ArrayRemove(vec![Value::from(user.as_str())]),
        );
        w.insert("likes".into(), FieldWrite::Increment(-1));
    }
    w
}

pub fn share_writes() -> WriteFields {
    let mut w = WriteFields::new();
    w.insert("shares".into(), FieldWrite::Increment(1));
    w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{apply_writes, Fields};

    fn materialize(writes: &WriteFields) -> Document {
        let mut fields = Fields::new();
        apply_writes(&mut fields, writes, Utc::now());
        Document {
            id: "doc1".into(),
            fields,
        }
    }

    #[test]
    fn conversation_round_trip() {
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");
        let prop = PropertyId::new("p1");
        let doc = materialize(&new_conversation_writes(
            &u2,
            &u1,
            Some(&prop),
            Some("3BHK Villa"),
        ));
        let convo = conversation_from_doc(&doc).unwrap();
        assert_eq!(convo.participants, vec![u1.clone(), u2.clone()]);
        assert_eq!(convo.last_message, "");
        assert_eq!(convo.unread_count, 0);
        assert_eq!(convo.property_id, Some(prop));
        assert_eq!(convo.property_title.as_deref(), Some("3BHK Villa"));
        assert_eq!(convo.counterpart(&u1), Some(&u2));
        assert_eq!(convo.counterpart(&UserId::new("u3")), None);
    }

    #[test]
    fn conversation_requires_two_participants() {
        let doc = Document {
            id: "broken".into(),
            fields: Fields::new(),
        };
        assert!(matches!(
            conversation_from_doc(&doc),
            Err(StoreError::Schema(_))
        ));
    }

    #[test]
    fn message_round_trip() {
        let sender = UserId::new("u1");
        let doc = materialize(&new_message_writes("Is this still available?", &sender));
        let msg = message_from_doc(&doc).unwrap();
        assert_eq!(msg.text, "Is this still available?");
        assert_eq!(msg.sender_id, sender);
        assert!(!msg.read);
        assert!(msg.created_at.is_some());
    }

    #[test]
    fn listing_round_trip() {
        let owner = UserId::new("owner");
        let draft = ListingDraft {
            title: "3BHK Villa".into(),
            description: "Gated society".into(),
            price: "45 Lakh".into(),
            location: "Ranchi, Jharkhand".into(),
            category: PropertyCategory::Villa,
            listing_kind: ListingKind::Sell,
            images: vec!["file:///a.jpg".into()],
            bedrooms: Some(3),
            bathrooms: Some(2),
            area: Some("1500 sqft".into()),
        };
        let doc = materialize(&new_listing_writes(&draft, &owner));
        let listing = listing_from_doc(&doc).unwrap();
        assert_eq!(listing.owner_id, owner);
        assert_eq!(listing.category, PropertyCategory::Villa);
        assert_eq!(listing.listing_kind, ListingKind::Sell);
        assert_eq!(listing.images, draft.images);
        assert_eq!(listing.likes, 0);
        assert!(listing.liked_by.is_empty());
    }

    #[test]
    fn unknown_category_is_schema_error() {
        let mut w = WriteFields::new();
        w.insert("ownerId".into(), set("owner"));
        w.insert("category".into(), set("Castle"));
        w.insert("listingType".into(), set("Sell"));
        let doc = materialize(&w);
        assert!(matches!(listing_from_doc(&doc), Err(StoreError::Schema(_))));
    }

    #[test]
    fn profile_patch_only_touches_given_fields() {
        let patch = ProfilePatch {
            name: Some("Asha".into()),
            ..Default::default()
        };
        let w = profile_patch_writes(&patch);
        assert!(w.contains_key("name"));
        assert!(w.contains_key("updatedAt"));
        assert!(!w.contains_key("phone"));
        assert!(!w.contains_key("address"));
        assert!(!w.contains_key("image"));
    }
}
