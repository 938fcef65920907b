//! Authoring model, pre-flight validation and per-destination request construction
//!
//! Everything here is pure: no request leaves the process until
//! [`build_requests`] has validated the whole composition.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::constants::HASHTAG_SEPARATOR;
use crate::models::{Destination, Platform, UploadFile};
use crate::session::Session;

/// Post kind sent as `post_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Text,
    Image,
    Video,
    Carousel,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Text => "text",
            PostKind::Image => "image",
            PostKind::Video => "video",
            PostKind::Carousel => "carousel",
        }
    }
}

/// Media kind sent as `media_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Text,
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// Status requested from the backend for a new post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Published,
    Scheduled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Published => "published",
            RequestStatus::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    Immediate,
    /// `None` until the user picks a time
    Scheduled(Option<DateTime<Utc>>),
}

impl PublishMode {
    pub fn request_status(&self) -> RequestStatus {
        match self {
            PublishMode::Immediate => RequestStatus::Published,
            PublishMode::Scheduled(_) => RequestStatus::Scheduled,
        }
    }
}

/// Template ids applied to every destination alike
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateRefs {
    pub image_frame: Option<i64>,
    pub video_frame: Option<i64>,
    pub watermark: Option<i64>,
}

impl TemplateRefs {
    /// Referenced template ids, each once, in image-frame/video-frame/watermark order
    pub fn distinct_ids(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(3);
        for id in [self.image_frame, self.video_frame, self.watermark]
            .into_iter()
            .flatten()
        {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Media the author attached
#[derive(Debug, Clone, Default)]
pub struct MediaSelection {
    pub video_file: Option<UploadFile>,
    pub image_files: Vec<UploadFile>,
    pub library_video_url: Option<String>,
    /// Newline-delimited URL lists keyed by lowercase platform name
    platform_media_urls: BTreeMap<String, String>,
}

impl MediaSelection {
    pub fn set_media_urls(&mut self, platform: &Platform, raw: impl Into<String>) {
        self.platform_media_urls
            .insert(platform.group_key(), raw.into());
    }

    /// Non-blank lines of the URL list for this platform group
    pub fn media_urls_for(&self, platform: &Platform) -> Vec<String> {
        self.platform_media_urls
            .get(&platform.group_key())
            .map(|raw| {
                raw.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One post as the author wrote it, before fan-out
#[derive(Debug, Clone)]
pub struct AuthoredPost {
    pub content: String,
    pub hashtags: Option<String>,
    pub media: MediaSelection,
    pub templates: TemplateRefs,
    pub mode: PublishMode,
}

impl AuthoredPost {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            hashtags: None,
            media: MediaSelection::default(),
            templates: TemplateRefs::default(),
            mode: PublishMode::Immediate,
        }
    }

    pub fn with_hashtags(mut self, hashtags: impl Into<String>) -> Self {
        self.hashtags = Some(hashtags.into());
        self
    }

    pub fn scheduled(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.mode = PublishMode::Scheduled(at);
        self
    }

    /// Body with hashtags appended after a blank line, when there are any
    pub fn merged_content(&self) -> String {
        match self.hashtags.as_deref().map(str::trim) {
            Some(tags) if !tags.is_empty() => {
                format!("{}{}{}", self.content, HASHTAG_SEPARATOR, tags)
            }
            _ => self.content.clone(),
        }
    }
}

/// `POST /posts` payload for one destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishRequest {
    pub user_id: i64,
    pub page_id: i64,
    pub content: String,
    pub status: RequestStatus,
    pub post_type: PostKind,
    pub media_type: MediaKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
    #[serde(skip)]
    pub files: Vec<UploadFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_frame_template_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_frame_template_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_template_id: Option<i64>,
    #[serde(skip)]
    pub platform: Platform,
}

impl PublishRequest {
    /// File uploads force a multipart body; everything else goes as JSON
    pub fn is_multipart(&self) -> bool {
        !self.files.is_empty()
    }

    /// Text fields of the multipart body, `media_urls` repeated per URL
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("user_id", self.user_id.to_string()),
            ("page_id", self.page_id.to_string()),
            ("content", self.content.clone()),
            ("status", self.status.as_str().to_string()),
            ("post_type", self.post_type.as_str().to_string()),
            ("media_type", self.media_type.as_str().to_string()),
        ];

        fields.extend(self.media_urls.iter().map(|url| ("media_urls", url.clone())));

        if let Some(url) = &self.video_url {
            fields.push(("video_url", url.clone()));
        }
        if let Some(at) = self.scheduled_at {
            fields.push((
                "scheduled_at",
                at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }

        let templates = [
            ("image_frame_template_id", self.image_frame_template_id),
            ("video_frame_template_id", self.video_frame_template_id),
            ("watermark_template_id", self.watermark_template_id),
        ];
        fields.extend(
            templates
                .into_iter()
                .filter_map(|(name, id)| id.map(|id| (name, id.to_string()))),
        );

        fields
    }
}

/// Pre-flight rejection; nothing has been sent when one of these is returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoDestination,
    EmptyContent,
    MissingMediaUrls { platform: String },
    MissingScheduleTime,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::NoDestination => "NO_DESTINATION",
            ValidationError::EmptyContent => "EMPTY_CONTENT",
            ValidationError::MissingMediaUrls { .. } => "MISSING_MEDIA_URLS",
            ValidationError::MissingScheduleTime => "MISSING_SCHEDULE_TIME",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NoDestination => write!(f, "Select at least one page"),
            ValidationError::EmptyContent => write!(f, "Post content cannot be empty"),
            ValidationError::MissingMediaUrls { platform } => {
                write!(f, "{platform} requires at least one media URL")
            }
            ValidationError::MissingScheduleTime => {
                write!(f, "Pick a time for the scheduled post")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a composition before any request is built. The first violation wins.
pub fn validate(post: &AuthoredPost, destinations: &[Destination]) -> Result<(), ValidationError> {
    if destinations.is_empty() {
        return Err(ValidationError::NoDestination);
    }

    if post.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    if let Some(dest) = destinations.iter().find(|d| {
        d.platform.requires_media_urls() && post.media.media_urls_for(&d.platform).is_empty()
    }) {
        return Err(ValidationError::MissingMediaUrls {
            platform: dest.platform.name().to_string(),
        });
    }

    if post.mode == PublishMode::Scheduled(None) {
        return Err(ValidationError::MissingScheduleTime);
    }

    Ok(())
}

/// Media payload resolved for one destination
struct ResolvedMedia {
    post_type: PostKind,
    media_type: MediaKind,
    media_urls: Vec<String>,
    files: Vec<UploadFile>,
    video_url: Option<String>,
}

/// URL list, then uploaded video, then library video, then uploaded images, then text
fn resolve_media(media: &MediaSelection, platform: &Platform) -> ResolvedMedia {
    let none = ResolvedMedia {
        post_type: PostKind::Text,
        media_type: MediaKind::Text,
        media_urls: Vec::new(),
        files: Vec::new(),
        video_url: None,
    };

    if platform.requires_media_urls() {
        let urls = media.media_urls_for(platform);
        if !urls.is_empty() {
            let post_type = if urls.len() > 1 {
                PostKind::Carousel
            } else {
                PostKind::Image
            };
            return ResolvedMedia {
                post_type,
                media_type: MediaKind::Image,
                media_urls: urls,
                ..none
            };
        }
    }

    if let Some(video) = &media.video_file {
        return ResolvedMedia {
            post_type: PostKind::Video,
            media_type: MediaKind::Video,
            files: vec![video.clone()],
            ..none
        };
    }

    if let Some(url) = media.library_video_url.as_deref().map(str::trim)
        && !url.is_empty()
    {
        return ResolvedMedia {
            post_type: PostKind::Video,
            media_type: MediaKind::Video,
            video_url: Some(url.to_string()),
            ..none
        };
    }

    if !media.image_files.is_empty() {
        return ResolvedMedia {
            post_type: PostKind::Image,
            media_type: MediaKind::Image,
            files: media.image_files.clone(),
            ..none
        };
    }

    none
}

/// Build the request for one destination. Assumes [`validate`] passed.
pub fn build_request(
    session: &Session,
    post: &AuthoredPost,
    destination: &Destination,
) -> PublishRequest {
    let media = resolve_media(&post.media, &destination.platform);
    let scheduled_at = match post.mode {
        PublishMode::Immediate => None,
        PublishMode::Scheduled(at) => at,
    };

    PublishRequest {
        user_id: session.user_id,
        page_id: destination.id,
        content: post.merged_content(),
        status: post.mode.request_status(),
        post_type: media.post_type,
        media_type: media.media_type,
        media_urls: media.media_urls,
        files: media.files,
        video_url: media.video_url,
        scheduled_at,
        image_frame_template_id: post.templates.image_frame,
        video_frame_template_id: post.templates.video_frame,
        watermark_template_id: post.templates.watermark,
        platform: destination.platform.clone(),
    }
}

/// Validate, then build one request per destination in selection order
pub fn build_requests(
    session: &Session,
    post: &AuthoredPost,
    destinations: &[Destination],
) -> Result<Vec<PublishRequest>, ValidationError> {
    validate(post, destinations)?;

    Ok(destinations
        .iter()
        .map(|dest| build_request(session, post, dest))
        .collect())
}
