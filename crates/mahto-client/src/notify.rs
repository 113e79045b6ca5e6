//! Toast-style notices and the error-to-friendly-message table.
//!
//! Validation no-ops (empty message text) never reach this layer; every
//! other user-visible failure maps to a short title/message pair the UI
//! can show directly.

use serde::Serialize;

use mahto_store::{AuthError, StoreError};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Error,
    Info,
    Warning,
}

/// A notification ready for the toast banner.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Map a failure to the notice shown to the user.
pub fn notice_for_error(err: &ClientError) -> Notice {
    match err {
        ClientError::NotSignedIn => Notice::new(
            Severity::Info,
            "Sign In Required",
            "Please sign in to continue.",
        ),
        ClientError::SelfConversation => Notice::new(
            Severity::Info,
            "My Property",
            "This is your own property!",
        ),
        ClientError::TooManyImages(_) => Notice::new(
            Severity::Warning,
            "Too Many Photos",
            "You can add up to 5 photos per listing.",
        ),
        ClientError::NotOwner => Notice::new(
            Severity::Error,
            "Not Allowed",
            "Only the owner can change this listing.",
        ),
        ClientError::Timeout => Notice::new(
            Severity::Error,
            "Connection Timeout",
            "Please check your internet connection and try again.",
        ),
        ClientError::Store(StoreError::NotFound(_)) => Notice::new(
            Severity::Error,
            "Not Found",
            "This item is no longer available.",
        ),
        ClientError::Auth(AuthError::InvalidCredentials) => Notice::new(
            Severity::Error,
            "Login Failed",
            "Invalid phone number or password.",
        ),
        ClientError::Auth(AuthError::AlreadyRegistered) => Notice::new(
            Severity::Error,
            "Account Exists",
            "This phone number is already registered. Try logging in instead.",
        ),
        ClientError::Auth(AuthError::WeakPassword) => Notice::new(
            Severity::Warning,
            "Weak Password",
            "Passwords need at least 6 characters.",
        ),
        _ => Notice::new(
            Severity::Error,
            "Something Went Wrong",
            "Please try again in a moment.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_errors_get_friendly_messages() {
        let notice = notice_for_error(&ClientError::NotSignedIn);
        assert_eq!(notice.severity, Severity::Info);
        assert_eq!(notice.title, "Sign In Required");

        let notice = notice_for_error(&ClientError::Auth(AuthError::InvalidCredentials));
        assert_eq!(notice.severity, Severity::Error);
        assert_eq!(notice.message, "Invalid phone number or password.");

        let notice =
            notice_for_error(&ClientError::Store(StoreError::NotFound("x".into())));
        assert_eq!(notice.title, "Not Found");
    }

    #[test]
    fn unknown_errors_fall_back_to_generic() {
        let notice = notice_for_error(&ClientError::Store(StoreError::Poisoned));
        assert_eq!(notice.title, "Something Went Wrong");
    }
}
