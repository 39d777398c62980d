//! Size and range limits for the harvester.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so some limits are duplicated there. Keep both in sync when modifying.

// === Query Limits ===

/// Default page size for corpus listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Maximum page size for corpus listings.
pub const MAX_PAGE_LIMIT: u32 = 1000;

/// Page size bounds for user action listings.
pub const DEFAULT_ACTION_PAGE_LIMIT: u32 = 100;
pub const MAX_ACTION_PAGE_LIMIT: u32 = 100;

// === Post Field Limits (chars) ===

/// Platform id max length. Reddit ids are ~7 chars, tweet ids ~19.
pub const MAX_PLATFORM_ID_LEN: usize = 128;

/// Post body max length.
/// Reddit self posts cap at 40k chars; tweets are far shorter.
pub const MAX_CONTENT_LEN: usize = 40_000;

/// Permalink max length.
pub const MAX_URL_LEN: usize = 2048;

/// Author handle max length.
pub const MAX_AUTHOR_LEN: usize = 128;

/// Source name (subreddit, search keyword) max length.
pub const MAX_SOURCE_NAME_LEN: usize = 256;

/// Free-form `extra_data` JSON max size in bytes (16KB).
pub const MAX_EXTRA_DATA_BYTES: usize = 16 * 1024;

// === Connector Limits ===

/// Twitter recent search accepts between 10 and 100 results per page.
pub const TWITTER_MIN_RESULTS: u32 = 10;
pub const TWITTER_MAX_RESULTS: u32 = 100;

/// Reddit listings return at most 100 items per request.
pub const REDDIT_MAX_RESULTS: u32 = 100;
