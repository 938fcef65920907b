//! Application constants

/// Default backend base URL when `POSTDESK_API_URL` is unset
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";

/// Default timeout for list/detail reads (seconds)
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Default timeout for media uploads (seconds)
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

/// Default timeout for publish submissions (seconds).
/// A single submission may fan out into several platform-side publishes on the backend.
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 300;

/// Characters of content used by the list-view campaign key
pub const LIST_CONTENT_PREFIX_CHARS: usize = 100;

/// Proximity window used when reconstructing a campaign around one post (ms)
pub const DETAIL_WINDOW_MS: i64 = 60_000;

/// Separator placed between the post body and its hashtags
pub const HASHTAG_SEPARATOR: &str = "\n\n";

/// Platforms that only accept explicit media URLs, never file uploads
pub const URL_ONLY_PLATFORMS: [&str; 2] = ["instagram", "threads"];

/// Label shown for a post whose page reference is missing
pub const UNKNOWN_PAGE_LABEL: &str = "Unknown page";

/// Label shown for a post whose platform reference is missing
pub const UNKNOWN_PLATFORM_LABEL: &str = "unknown";
