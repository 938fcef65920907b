//! Shared data models used across modules

use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{UNKNOWN_PLATFORM_LABEL, URL_ONLY_PLATFORMS};

/// Platform name as delivered by the backend (`facebook`, `instagram`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Lowercase name used to look up per-platform media URL lists
    pub fn group_key(&self) -> String {
        self.0.trim().to_lowercase()
    }

    /// Instagram and Threads take media by URL only
    pub fn requires_media_urls(&self) -> bool {
        let name = self.0.trim();
        URL_ONLY_PLATFORMS
            .iter()
            .any(|platform| name.eq_ignore_ascii_case(platform))
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self(UNKNOWN_PLATFORM_LABEL.to_string())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Platform {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Pages carry either `"platform": "facebook"` or `"platform": { "name": "facebook" }`
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum PlatformField {
            Name(String),
            Object {
                #[serde(default, alias = "platform_name")]
                name: Option<String>,
            },
        }

        let field = Option::<PlatformField>::deserialize(deserializer)?;
        let name = match field {
            Some(PlatformField::Name(name)) => Some(name),
            Some(PlatformField::Object { name }) => name,
            None => None,
        };

        Ok(name
            .filter(|n| !n.trim().is_empty())
            .map(Platform)
            .unwrap_or_default())
    }
}

/// A page the user can publish to (one row of `GET /pages`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    #[serde(default, alias = "page_name", deserialize_with = "de::string_or_null")]
    pub name: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub follower_count: Option<i64>,
}

impl Destination {
    pub fn new(id: i64, name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            platform: Platform::new(platform),
            follower_count: None,
        }
    }
}

/// Post lifecycle status as stored by the backend
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Scheduled,
    Publishing,
    Published,
    Failed,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Publishing => "publishing",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Deleted => "deleted",
            PostStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page reference embedded in a persisted post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRef {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "page_name", deserialize_with = "de::string_or_null")]
    pub name: String,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub follower_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "file_url")]
    pub url: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtagAttachment {
    #[serde(
        default,
        alias = "tag",
        alias = "hashtag",
        deserialize_with = "de::string_or_null"
    )]
    pub name: String,
}

/// A post as returned by `GET /posts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedPost {
    pub id: i64,
    #[serde(default, deserialize_with = "de::string_or_null")]
    pub content: String,
    #[serde(default, deserialize_with = "de::status_or_default")]
    pub status: PostStatus,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub page: Option<PageRef>,
    #[serde(default, deserialize_with = "de::vec_or_null")]
    pub media: Vec<MediaAttachment>,
    #[serde(default, deserialize_with = "de::vec_or_null")]
    pub hashtags: Vec<HashtagAttachment>,
    #[serde(default, alias = "post_url")]
    pub platform_post_url: Option<String>,
}

impl PersistedPost {
    /// Timestamp a post is shown under: scheduled, else published, else created
    pub fn display_timestamp(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at.or(self.published_at).or(self.created_at)
    }
}

/// A file picked for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = mime_for_path(&file_name);

        Ok(Self::new(file_name, mime_type, data))
    }
}

/// MIME type for a file name, `application/octet-stream` when unknown
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and the naive forms the backend emits (`2024-01-01T10:05:00`,
/// `2024-01-01 10:05:00.123`, `2024-01-01T10:05`), naive values read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Lenient field deserializers: sparse or malformed rows must not sink a whole list
mod de {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{PostStatus, parse_timestamp};

    pub fn string_or_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
    }

    pub fn status_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<PostStatus, D::Error> {
        Ok(Option::<PostStatus>::deserialize(d)?.unwrap_or_default())
    }

    pub fn vec_or_null<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
    }

    pub fn lenient_timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        // Only strings are timestamps; numbers, objects and junk become absent
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(raw)) => parse_timestamp(&raw),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_only_platforms_match_case_insensitively() {
        assert!(Platform::new("Instagram").requires_media_urls());
        assert!(Platform::new("THREADS").requires_media_urls());
        assert!(!Platform::new("facebook").requires_media_urls());
        assert!(!Platform::new("instagram_business").requires_media_urls());
        assert_eq!(Platform::new(" Instagram ").group_key(), "instagram");
    }

    #[test]
    fn persisted_post_tolerates_sparse_rows() {
        let json = r#"{
            "id": 7,
            "content": null,
            "status": "archived",
            "created_at": "2024-01-01 10:05:00",
            "scheduled_at": "not a date",
            "page": { "page_name": "Bakery", "platform": { "name": "facebook" } },
            "media": null
        }"#;

        let post: PersistedPost = serde_json::from_str(json).expect("parse post");
        assert_eq!(post.content, "");
        assert_eq!(post.status, PostStatus::Unknown);
        assert_eq!(post.created_at, parse_timestamp("2024-01-01T10:05:00Z"));
        assert_eq!(post.scheduled_at, None);
        assert!(post.media.is_empty());

        let page = post.page.expect("page");
        assert_eq!(page.name, "Bakery");
        assert_eq!(page.platform.name(), "facebook");
    }

    #[test]
    fn non_string_timestamps_and_odd_hashtags_do_not_sink_the_list() {
        let posts: Vec<PersistedPost> = serde_json::from_str(
            r##"[
                { "id": 1, "content": "A", "created_at": 1704103500, "published_at": {} },
                { "id": 2, "content": "B", "hashtags": [{ "id": 3, "hashtag": "#x" }, { "id": 4 }] },
                { "id": 3, "content": "C", "created_at": "2024-01-01T10:05:00Z" }
            ]"##,
        )
        .expect("parse posts");

        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].created_at, None);
        assert_eq!(posts[0].published_at, None);
        assert_eq!(posts[1].hashtags.len(), 2);
        assert_eq!(posts[1].hashtags[0].name, "#x");
        assert_eq!(posts[1].hashtags[1].name, "");
        assert_eq!(posts[2].created_at, parse_timestamp("2024-01-01T10:05:00Z"));
    }

    #[test]
    fn destination_accepts_string_or_missing_platform() {
        let pages: Vec<Destination> = serde_json::from_str(
            r#"[
                { "id": 1, "name": "Shop", "platform": "instagram" },
                { "id": 2, "page_name": "Blog" }
            ]"#,
        )
        .expect("parse pages");

        assert!(pages[0].platform.requires_media_urls());
        assert_eq!(pages[1].name, "Blog");
        assert_eq!(pages[1].platform.name(), "unknown");
    }

    #[test]
    fn timestamps_parse_rfc3339_and_naive_forms() {
        let expected = DateTime::parse_from_rfc3339("2024-01-01T10:05:30Z")
            .map(|ts| ts.with_timezone(&Utc))
            .ok();

        assert_eq!(parse_timestamp("2024-01-01T10:05:30Z"), expected);
        assert_eq!(parse_timestamp("2024-01-01T12:05:30+02:00"), expected);
        assert_eq!(parse_timestamp("2024-01-01T10:05:30.000000"), expected);
        assert_eq!(parse_timestamp("2024-01-01 10:05:30"), expected);
        assert!(parse_timestamp("2024-01-01T10:05").is_some());
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn display_timestamp_prefers_scheduled_then_published() {
        let mut post: PersistedPost = serde_json::from_str(
            r#"{ "id": 1, "created_at": "2024-01-01T08:00:00Z", "published_at": "2024-01-02T08:00:00Z" }"#,
        )
        .expect("parse post");
        assert_eq!(post.display_timestamp(), post.published_at);

        post.scheduled_at = parse_timestamp("2024-01-03T08:00:00Z");
        assert_eq!(post.display_timestamp(), post.scheduled_at);

        post.scheduled_at = None;
        post.published_at = None;
        assert_eq!(post.display_timestamp(), post.created_at);
    }

    #[test]
    fn mime_guessing_follows_extension() {
        assert_eq!(mime_for_path("clip.MP4"), "video/mp4");
        assert_eq!(mime_for_path("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for_path("notes"), "application/octet-stream");
    }
}
