/// Application name
pub const APP_NAME: &str = "MAHTO";

/// Domain of the phone-derived virtual email addresses
pub const VIRTUAL_EMAIL_DOMAIN: &str = "mahto.app";

/// Maximum number of images attached to one property listing
pub const MAX_LISTING_IMAGES: usize = 5;

/// Minimum accepted password length at sign-up
pub const MIN_PASSWORD_LEN: usize = 6;

/// Default timeout for user-initiated writes (send, start conversation)
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 8_000;

/// Default timeout for point reads (counterpart profile, property detail)
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 8_000;

/// Default capacity of the counterpart-profile cache in the directory
pub const DEFAULT_PROFILE_CACHE_CAPACITY: usize = 64;

/// Default bound on concurrent counterpart-profile fetches per emission
pub const DEFAULT_PROFILE_FANOUT: usize = 8;

/// Default cap on the number of conversations the directory loads
pub const DEFAULT_DIRECTORY_LIMIT: usize = 200;

/// Length of store-generated document ids
pub const AUTO_ID_LEN: usize = 20;
