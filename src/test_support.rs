//! In-memory backend used by unit tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::Semaphore;

use crate::domain::composer::PublishRequest;
use crate::models::{Destination, PersistedPost};
use crate::services::api::{PostBackend, PostFilter, PublishResponse};
use crate::services::error::ApiError;
use crate::session::Session;

#[derive(Debug, Default)]
pub struct FakeState {
    pub created: Vec<PublishRequest>,
    /// Pages whose publish call errors out
    pub failing_pages: HashSet<i64>,
    /// Pages whose publish call answers `success: false`
    pub rejecting_pages: HashSet<i64>,
    /// Pages whose publish call answers `success: true`
    pub confirming_pages: HashSet<i64>,
    pub posts: Vec<PersistedPost>,
    /// Posts `get_post` finds but `list_posts` leaves out
    pub unlisted: HashSet<i64>,
    pub pages: Vec<Destination>,
    pub fail_list_pages: bool,
    pub deleted: Vec<i64>,
    pub failing_deletes: HashSet<i64>,
    pub template_increments: Vec<i64>,
    pub fail_template_increments: bool,
    pub in_flight: usize,
    pub max_in_flight: usize,
}

#[derive(Debug, Default, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    /// Publish calls wait for a permit when set
    gate: Option<Arc<Semaphore>>,
}

impl FakeBackend {
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            state: Arc::default(),
            gate: Some(gate),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake backend state")
    }
}

impl PostBackend for FakeBackend {
    async fn create_post(
        &self,
        _session: &Session,
        request: &PublishRequest,
    ) -> Result<PublishResponse, ApiError> {
        {
            let mut state = self.state();
            state.created.push(request.clone());
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        tokio::task::yield_now().await;
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.expect("gate open");
        }

        let mut state = self.state();
        state.in_flight -= 1;

        if state.failing_pages.contains(&request.page_id) {
            return Err(ApiError::UnexpectedStatus {
                status: StatusCode::BAD_GATEWAY,
                body: "platform unavailable".into(),
            });
        }
        if state.rejecting_pages.contains(&request.page_id) {
            return Ok(PublishResponse {
                body: json!({ "success": false, "message": "token expired" }),
            });
        }
        if state.confirming_pages.contains(&request.page_id) {
            return Ok(PublishResponse {
                body: json!({ "success": true, "id": request.page_id * 100 }),
            });
        }
        Ok(PublishResponse::default())
    }

    async fn list_posts(
        &self,
        _session: &Session,
        _filter: &PostFilter,
    ) -> Result<Vec<PersistedPost>, ApiError> {
        let state = self.state();
        Ok(state
            .posts
            .iter()
            .filter(|p| !state.unlisted.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn get_post(&self, _session: &Session, post_id: i64) -> Result<PersistedPost, ApiError> {
        self.state()
            .posts
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
            .ok_or(ApiError::UnexpectedStatus {
                status: StatusCode::NOT_FOUND,
                body: String::new(),
            })
    }

    async fn delete_post(&self, _session: &Session, post_id: i64) -> Result<(), ApiError> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        if state.failing_deletes.contains(&post_id) {
            return Err(ApiError::UnexpectedStatus {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "locked".into(),
            });
        }
        state.deleted.push(post_id);
        Ok(())
    }

    async fn increment_template_usage(
        &self,
        _session: &Session,
        template_id: i64,
    ) -> Result<(), ApiError> {
        let mut state = self.state();
        state.template_increments.push(template_id);
        if state.fail_template_increments {
            return Err(ApiError::Decode("usage counter offline".into()));
        }
        Ok(())
    }

    async fn list_pages(&self, _session: &Session) -> Result<Vec<Destination>, ApiError> {
        let state = self.state();
        if state.fail_list_pages {
            return Err(ApiError::UnexpectedStatus {
                status: StatusCode::UNAUTHORIZED,
                body: "session expired".into(),
            });
        }
        Ok(state.pages.clone())
    }
}

/// A persisted post with the fields grouping looks at
pub fn post(id: i64, content: &str, created_at: &str) -> PersistedPost {
    PersistedPost {
        id,
        content: content.to_string(),
        status: Default::default(),
        created_at: crate::models::parse_timestamp(created_at),
        scheduled_at: None,
        published_at: None,
        post_type: None,
        page: None,
        media: Vec::new(),
        hashtags: Vec::new(),
        platform_post_url: None,
    }
}
