//! System-wide constants for the MP bank.

/// Page size used by transaction listings when the caller gives none.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Largest page a single listing call may request.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Prefix marking a reason as a reference into the standard-transaction catalog.
pub const CATALOG_REASON_PREFIX: &str = "id:";

/// Display name used when a referenced account cannot be resolved.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Width of the role bitmask in bits.
pub const ROLE_MASK_BITS: u32 = 32;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "MP Bank";
