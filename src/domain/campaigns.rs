//! Campaign reconstruction from a flat post list
//!
//! The backend has no campaign id. Posts created by one fan-out share their
//! content and were created within moments of each other, so campaigns are
//! inferred from those two signals. This is a heuristic: unrelated posts with
//! the same text in the same minute are merged, and that is expected.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::constants::{
    DETAIL_WINDOW_MS, LIST_CONTENT_PREFIX_CHARS, UNKNOWN_PAGE_LABEL, UNKNOWN_PLATFORM_LABEL,
};
use crate::models::{PersistedPost, PostStatus};

/// How much of the content must agree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMatch {
    /// First N characters
    Prefix(usize),
    Exact,
}

/// How close the creation times must be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMatch {
    /// Same `YYYY-MM-DDTHH:MM` bucket; 10:05:59 and 10:06:00 differ
    SameMinute,
    /// Strictly less than the window apart, measured against the group's first member
    Within(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingRule {
    pub content: ContentMatch,
    pub time: TimeMatch,
}

impl GroupingRule {
    /// Campaign list: 100-character prefix, same creation minute
    pub fn list_view() -> Self {
        Self {
            content: ContentMatch::Prefix(LIST_CONTENT_PREFIX_CHARS),
            time: TimeMatch::SameMinute,
        }
    }

    /// Campaign detail: identical content, created less than 60s from the anchor
    pub fn detail_view() -> Self {
        Self::within(Duration::milliseconds(DETAIL_WINDOW_MS))
    }

    pub fn within(window: Duration) -> Self {
        Self {
            content: ContentMatch::Exact,
            time: TimeMatch::Within(window),
        }
    }

    fn content_key<'a>(&self, content: &'a str) -> &'a str {
        match self.content {
            ContentMatch::Exact => content,
            ContentMatch::Prefix(chars) => content
                .char_indices()
                .nth(chars)
                .map(|(end, _)| &content[..end])
                .unwrap_or(content),
        }
    }

    /// Equivalence key for bucketed rules; window rules have none
    fn bucket_key<'a>(&self, post: &'a PersistedPost) -> Option<(&'a str, String)> {
        match self.time {
            TimeMatch::SameMinute => Some((
                self.content_key(&post.content),
                minute_key(post.created_at),
            )),
            TimeMatch::Within(_) => None,
        }
    }

    /// Whether `candidate` belongs with `anchor`. Not transitive for window rules.
    pub fn matches(&self, anchor: &PersistedPost, candidate: &PersistedPost) -> bool {
        if anchor.id == candidate.id {
            return true;
        }

        if self.content_key(&anchor.content) != self.content_key(&candidate.content) {
            return false;
        }

        match self.time {
            TimeMatch::SameMinute => minute_key(anchor.created_at) == minute_key(candidate.created_at),
            TimeMatch::Within(window) => match (anchor.created_at, candidate.created_at) {
                (Some(a), Some(b)) => (a - b).abs() < window,
                _ => false,
            },
        }
    }
}

/// `created_at` cut to the minute, empty when missing
fn minute_key(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_default()
}

/// One destination of a campaign, as shown in the list and detail views
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationSummary {
    pub post_id: i64,
    pub page_name: String,
    pub platform: String,
    pub follower_count: Option<i64>,
    pub status: PostStatus,
    /// Only for published posts
    pub post_url: Option<String>,
}

impl DestinationSummary {
    fn from_post(post: &PersistedPost) -> Self {
        let page = post.page.as_ref();

        let page_name = page
            .map(|p| p.name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_PAGE_LABEL)
            .to_string();
        let platform = page
            .map(|p| p.platform.name().trim())
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_PLATFORM_LABEL)
            .to_string();
        let post_url = if post.status == PostStatus::Published {
            post.platform_post_url.clone()
        } else {
            None
        };

        Self {
            post_id: post.id,
            page_name,
            platform,
            follower_count: page.and_then(|p| p.follower_count),
            status: post.status,
            post_url,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub scheduled: usize,
    pub publishing: usize,
    pub published: usize,
    pub failed: usize,
    pub deleted: usize,
    pub unknown: usize,
}

impl StatusCounts {
    fn record(&mut self, status: PostStatus) {
        let slot = match status {
            PostStatus::Draft => &mut self.draft,
            PostStatus::Scheduled => &mut self.scheduled,
            PostStatus::Publishing => &mut self.publishing,
            PostStatus::Published => &mut self.published,
            PostStatus::Failed => &mut self.failed,
            PostStatus::Deleted => &mut self.deleted,
            PostStatus::Unknown => &mut self.unknown,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.draft
            + self.scheduled
            + self.publishing
            + self.published
            + self.failed
            + self.deleted
            + self.unknown
    }
}

/// An inferred campaign. Representative fields come from one member, never min/max.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignGroup {
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub posts: Vec<PersistedPost>,
    pub destinations: Vec<DestinationSummary>,
    pub status_counts: StatusCounts,
}

impl CampaignGroup {
    fn from_members(representative: &PersistedPost, members: &[&PersistedPost]) -> Self {
        let mut status_counts = StatusCounts::default();
        for member in members {
            status_counts.record(member.status);
        }

        Self {
            content: representative.content.clone(),
            created_at: representative.created_at,
            scheduled_at: representative.scheduled_at,
            published_at: representative.published_at,
            posts: members.iter().map(|p| (*p).clone()).collect(),
            destinations: members.iter().map(|p| DestinationSummary::from_post(p)).collect(),
            status_counts,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn post_ids(&self) -> Vec<i64> {
        self.posts.iter().map(|p| p.id).collect()
    }

    pub fn contains(&self, post_id: i64) -> bool {
        self.posts.iter().any(|p| p.id == post_id)
    }

    /// Members newest first by display timestamp, for the detail view
    pub fn members_by_recency(&self) -> Vec<&PersistedPost> {
        let mut members: Vec<_> = self.posts.iter().collect();
        members.sort_by(|a, b| b.display_timestamp().cmp(&a.display_timestamp()));
        members
    }
}

/// Group posts under `rule`, in first-encounter order.
///
/// Each group is represented by its first member. Bucketed rules group by key
/// equality; window rules compare each post against every group's first member
/// and join the first group that matches.
pub fn group_posts(posts: &[PersistedPost], rule: &GroupingRule) -> Vec<CampaignGroup> {
    let mut groups: Vec<Vec<&PersistedPost>> = Vec::new();
    let mut index: HashMap<(&str, String), usize> = HashMap::new();

    for post in posts {
        let slot = match rule.bucket_key(post) {
            Some(key) => {
                let next = groups.len();
                let slot = *index.entry(key).or_insert(next);
                (slot < next).then_some(slot)
            }
            None => groups
                .iter()
                .position(|members| rule.matches(members[0], post)),
        };

        match slot {
            Some(i) => groups[i].push(post),
            None => groups.push(vec![post]),
        }
    }

    groups
        .iter()
        .map(|members| CampaignGroup::from_members(members[0], members))
        .collect()
}

/// Campaign list view: list-view grouping, newest campaign first
pub fn group_into_campaigns(posts: &[PersistedPost]) -> Vec<CampaignGroup> {
    let mut groups = group_posts(posts, &GroupingRule::list_view());
    // stable: ties keep encounter order, missing timestamps sink to the end
    groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    groups
}

/// Campaign detail view: the anchor plus every post matching it, in encounter order
pub fn reconstruct_campaign(
    anchor: &PersistedPost,
    posts: &[PersistedPost],
    rule: &GroupingRule,
) -> CampaignGroup {
    let mut members: Vec<&PersistedPost> =
        posts.iter().filter(|p| rule.matches(anchor, p)).collect();

    if !members.iter().any(|p| p.id == anchor.id) {
        members.insert(0, anchor);
    }

    CampaignGroup::from_members(anchor, &members)
}
