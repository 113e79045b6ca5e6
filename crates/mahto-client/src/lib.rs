//! # mahto-client
//!
//! The MAHTO application core: session handling, the signed-in profile
//! mirror, the conversation directory, message threads and the property
//! catalog, all running against the document store and identity provider
//! contracts from `mahto-store`.

pub mod app;
pub mod config;
pub mod directory;
pub mod listings;
pub mod notify;
pub mod profile;
pub mod session;
pub mod thread;

mod error;

pub use app::MahtoApp;
pub use config::ClientConfig;
pub use directory::{ConversationDirectory, ConversationView, CounterpartProfile, DirectoryHandle};
pub use error::{ClientError, Result};
pub use listings::{CatalogHandle, ListingHandle, PropertyCatalog};
pub use notify::{notice_for_error, Notice, Severity};
pub use profile::{ProfileMirror, ProfileSnapshot};
pub use session::Session;
pub use thread::{time_label, MessageThread, PropertyLink, ThreadHandle};

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the process-wide tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to debug for the MAHTO crates and warn for
/// everything else.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mahto_client=debug,mahto_store=debug,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
