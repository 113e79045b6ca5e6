//! # mahto-store
//!
//! The backend-as-a-service surface consumed by the MAHTO client: a
//! document store with live query subscriptions, atomic write batches and
//! server-assigned timestamps, plus the session/identity provider.
//!
//! The hosted platform implements these contracts in production; the
//! in-memory backend in this crate implements them for tests and local
//! development.

pub mod auth;
pub mod backend;
pub mod memory;
pub mod models;
pub mod query;
pub mod schema;
pub mod value;

mod error;

pub use auth::{AuthError, IdentityProvider, MemoryIdentity};
pub use backend::{
    auto_id, DocumentStore, DocumentSubscription, QuerySubscription, SubscriptionGuard,
    WriteBatch,
};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use models::*;
pub use query::{Filter, OrderBy, Query};
pub use value::{Document, FieldWrite, Fields, Value, WriteFields};
