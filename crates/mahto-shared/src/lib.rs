//! # mahto-shared
//!
//! Identifiers, domain enums and app-wide constants shared by every crate
//! in the MAHTO workspace.

pub mod constants;
pub mod types;

pub use types::*;
