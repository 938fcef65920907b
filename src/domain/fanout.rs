//! Concurrent dispatch of one composition to every selected destination
//!
//! A submission sends all N requests at once and waits for every one of them
//! to settle. One failing destination never cancels, retries or rolls back its
//! siblings; the outcome is a count plus a single [`Notice`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::join_all;
use log::{info, warn};
use tokio::task::JoinHandle;

use crate::domain::campaigns::{
    CampaignGroup, GroupingRule, group_into_campaigns, reconstruct_campaign,
};
use crate::domain::composer::{
    AuthoredPost, PublishRequest, RequestStatus, TemplateRefs, ValidationError, build_requests,
};
use crate::domain::notice::Notice;
use crate::models::{Destination, Platform};
use crate::services::api::{PostBackend, PostFilter, PublishResponse};
use crate::services::error::{ApiError, LogErr};
use crate::session::Session;

/// Decides whether a backend response counts as a successful publish
#[derive(Clone)]
pub struct SuccessPolicy(Arc<dyn Fn(&PublishResponse) -> bool + Send + Sync>);

impl SuccessPolicy {
    /// Success unless the body explicitly says `success: false`
    pub fn optimistic() -> Self {
        Self(Arc::new(|response| response.success_flag() != Some(false)))
    }

    /// Success only when the body explicitly says `success: true`
    pub fn strict() -> Self {
        Self(Arc::new(|response| response.success_flag() == Some(true)))
    }

    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&PublishResponse) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn is_success(&self, response: &PublishResponse) -> bool {
        (self.0)(response)
    }
}

impl Default for SuccessPolicy {
    fn default() -> Self {
        Self::optimistic()
    }
}

impl fmt::Debug for SuccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SuccessPolicy(..)")
    }
}

/// Why a submission stopped before any destination was tried
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    Invalid(ValidationError),
    /// A submission from this composer has not settled yet
    Busy,
    /// The page list needed to resolve destinations could not be loaded
    Backend(String),
    UnknownPage(i64),
}

impl ComposeError {
    /// The single failure notice shown for a submission that never started
    pub fn notice(&self) -> Notice {
        Notice::failure(self)
    }
}

impl fmt::Display for ComposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComposeError::Invalid(err) => write!(f, "{err}"),
            ComposeError::Busy => write!(f, "A submission is already in progress"),
            ComposeError::Backend(msg) => write!(f, "Could not load pages: {msg}"),
            ComposeError::UnknownPage(id) => write!(f, "Page {id} is not connected"),
        }
    }
}

impl std::error::Error for ComposeError {}

impl From<ValidationError> for ComposeError {
    fn from(value: ValidationError) -> Self {
        ComposeError::Invalid(value)
    }
}

impl From<ApiError> for ComposeError {
    fn from(value: ApiError) -> Self {
        ComposeError::Backend(value.to_string())
    }
}

/// What happened at one destination
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationResult {
    pub page_id: i64,
    pub platform: Platform,
    pub succeeded: bool,
    pub error: Option<String>,
    pub response: Option<PublishResponse>,
}

#[derive(Debug)]
pub struct CampaignOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    /// In destination selection order, whatever order the requests finished in
    pub results: Vec<DestinationResult>,
    pub status: RequestStatus,
    template_usage: Option<JoinHandle<()>>,
}

impl CampaignOutcome {
    pub fn notice(&self) -> Notice {
        Notice::for_publish(self.success_count, self.failure_count, self.status)
    }

    /// The detached template-usage task, for callers that must not exit before it runs
    pub fn take_template_usage(&mut self) -> Option<JoinHandle<()>> {
        self.template_usage.take()
    }
}

/// Clears the in-flight flag when a submission settles or unwinds
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Composer<B> {
    backend: Arc<B>,
    policy: SuccessPolicy,
    in_flight: AtomicBool,
}

impl<B: PostBackend + 'static> Composer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_policy(backend, SuccessPolicy::default())
    }

    pub fn with_policy(backend: B, policy: SuccessPolicy) -> Self {
        Self {
            backend: Arc::new(backend),
            policy,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlight<'_>, ComposeError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| ComposeError::Busy)
    }

    /// Validate, fan out one request per destination, and settle them all.
    pub async fn submit_campaign(
        &self,
        session: &Session,
        post: &AuthoredPost,
        destinations: &[Destination],
    ) -> Result<CampaignOutcome, ComposeError> {
        let _guard = self.begin()?;
        let requests = build_requests(session, post, destinations)?;

        info!(
            "Submitting campaign to {} destination(s) as {}",
            requests.len(),
            post.mode.request_status().as_str()
        );

        let settled = join_all(requests.iter().map(|request| async move {
            let result = self.backend.create_post(session, request).await;
            self.settle(request, result)
        }))
        .await;

        let success_count = settled.iter().filter(|r| r.succeeded).count();
        let failure_count = settled.len() - success_count;
        let template_usage = self.spawn_template_usage(session, &post.templates);

        info!(
            "Campaign settled: {} succeeded, {} failed",
            success_count, failure_count
        );

        Ok(CampaignOutcome {
            success_count,
            failure_count,
            results: settled,
            status: post.mode.request_status(),
            template_usage,
        })
    }

    /// Resolve page ids against the user's connected pages, then submit
    pub async fn submit_to_pages(
        &self,
        session: &Session,
        post: &AuthoredPost,
        page_ids: &[i64],
    ) -> Result<CampaignOutcome, ComposeError> {
        let pages = self
            .backend
            .list_pages(session)
            .await
            .log_context("Loading pages failed")?;

        let destinations = page_ids
            .iter()
            .map(|id| {
                pages
                    .iter()
                    .find(|page| page.id == *id)
                    .cloned()
                    .ok_or(ComposeError::UnknownPage(*id))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.submit_campaign(session, post, &destinations).await
    }

    fn settle(
        &self,
        request: &PublishRequest,
        result: Result<PublishResponse, ApiError>,
    ) -> DestinationResult {
        let (succeeded, error, response) = match result {
            Ok(response) if self.policy.is_success(&response) => (true, None, Some(response)),
            Ok(response) => {
                let error = response
                    .message()
                    .unwrap_or("rejected by backend")
                    .to_string();
                (false, Some(error), Some(response))
            }
            Err(e) => (false, Some(e.to_string()), None),
        };

        if let Some(error) = &error {
            warn!(
                "Publish to page {} ({}) failed: {}",
                request.page_id, request.platform, error
            );
        }

        DestinationResult {
            page_id: request.page_id,
            platform: request.platform.clone(),
            succeeded,
            error,
            response,
        }
    }

    /// Bump each distinct referenced template once, detached; failures are only logged
    fn spawn_template_usage(
        &self,
        session: &Session,
        templates: &TemplateRefs,
    ) -> Option<JoinHandle<()>> {
        let ids = templates.distinct_ids();
        if ids.is_empty() {
            return None;
        }

        let backend = Arc::clone(&self.backend);
        let session = session.clone();

        Some(tokio::spawn(async move {
            let backend = &backend;
            let session = &session;
            join_all(ids.into_iter().map(|id| async move {
                backend
                    .increment_template_usage(session, id)
                    .await
                    .log_warn(&format!("Increment usage for template {} failed", id));
            }))
            .await;
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<i64>,
    pub failed: Vec<(i64, String)>,
}

impl DeleteOutcome {
    pub fn notice(&self) -> Notice {
        Notice::for_delete(self.deleted.len(), self.failed.len())
    }
}

/// The campaign a post belongs to, for deletion.
///
/// Uses the list-view group containing the post. A post missing from the list
/// is fetched directly and its detail-view campaign is used instead.
pub async fn campaign_for_post<B: PostBackend>(
    backend: &B,
    session: &Session,
    post_id: i64,
) -> Result<CampaignGroup, ApiError> {
    let posts = backend
        .list_posts(session, &PostFilter::default())
        .await
        .log_context("Loading posts failed")?;

    if let Some(group) = group_into_campaigns(&posts)
        .into_iter()
        .find(|group| group.contains(post_id))
    {
        return Ok(group);
    }

    let anchor = backend.get_post(session, post_id).await?;
    Ok(reconstruct_campaign(
        &anchor,
        &posts,
        &GroupingRule::detail_view(),
    ))
}

/// Delete every member of a campaign in parallel; no rollback on partial failure
pub async fn delete_campaign<B: PostBackend>(
    backend: &B,
    session: &Session,
    group: &CampaignGroup,
) -> DeleteOutcome {
    let results = join_all(group.posts.iter().map(|post| async move {
        (post.id, backend.delete_post(session, post.id).await)
    }))
    .await;

    let mut outcome = DeleteOutcome::default();
    for (id, result) in results {
        match result {
            Ok(()) => outcome.deleted.push(id),
            Err(e) => {
                warn!("Delete of post {} failed: {}", id, e);
                outcome.failed.push((id, e.to_string()));
            }
        }
    }
    outcome
}
