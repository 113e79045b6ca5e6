use thiserror::Error;

use mahto_store::{AuthError, StoreError};

use mahto_shared::constants::MAX_LISTING_IMAGES;

/// Errors surfaced by the client components.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires a signed-in identity.
    #[error("Not signed in")]
    NotSignedIn,

    /// A user tried to open a chat with themselves.
    #[error("Cannot start a conversation with yourself")]
    SelfConversation,

    /// A listing draft exceeds the image cap.
    #[error("A listing can carry at most {MAX_LISTING_IMAGES} images, got {0}")]
    TooManyImages(usize),

    /// A listing mutation by someone other than its owner.
    #[error("Only the owner can modify this listing")]
    NotOwner,

    /// A user-initiated write exceeded its bounded wait.
    #[error("Operation timed out")]
    Timeout,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
