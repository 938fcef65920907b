//! REST client for the scheduling backend

use std::future::Future;

use log::debug;
use reqwest::multipart;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{Config, RequestTier, Timeouts};
use crate::domain::composer::PublishRequest;
use crate::models::{Destination, PersistedPost, PostStatus, UploadFile};
use crate::services::error::ApiError;
use crate::session::Session;

/// Body returned by `POST /posts`.
///
/// The backend does not promise a shape; only an explicit `success` flag is read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublishResponse {
    pub body: Value,
}

impl PublishResponse {
    /// Parse a response body; an empty body is a response without any flag
    pub fn from_body(text: &str) -> Result<Self, ApiError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(Self {
            body: serde_json::from_str(text)?,
        })
    }

    pub fn success_flag(&self) -> Option<bool> {
        self.body.get("success").and_then(Value::as_bool)
    }

    pub fn message(&self) -> Option<&str> {
        ["message", "error", "detail"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
    }

    /// Id of the created post, at the top level or under `data`/`post`
    pub fn post_id(&self) -> Option<i64> {
        self.body
            .get("id")
            .or_else(|| self.body.get("data").and_then(|d| d.get("id")))
            .or_else(|| self.body.get("post").and_then(|p| p.get("id")))
            .and_then(Value::as_i64)
    }
}

/// Result of a media library upload
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MediaUpload {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, alias = "file_url")]
    pub url: Option<String>,
}

/// Filters for `GET /posts`; the user always comes from the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub page_id: Option<i64>,
}

impl PostFilter {
    pub fn query(&self, session: &Session) -> Vec<(&'static str, String)> {
        let mut query = vec![("user_id", session.user_id.to_string())];
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(page_id) = self.page_id {
            query.push(("page_id", page_id.to_string()));
        }
        query
    }
}

/// The backend calls the composer and reconstructor depend on
pub trait PostBackend: Send + Sync {
    fn create_post(
        &self,
        session: &Session,
        request: &PublishRequest,
    ) -> impl Future<Output = Result<PublishResponse, ApiError>> + Send;

    fn list_posts(
        &self,
        session: &Session,
        filter: &PostFilter,
    ) -> impl Future<Output = Result<Vec<PersistedPost>, ApiError>> + Send;

    fn get_post(
        &self,
        session: &Session,
        post_id: i64,
    ) -> impl Future<Output = Result<PersistedPost, ApiError>> + Send;

    fn delete_post(
        &self,
        session: &Session,
        post_id: i64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn increment_template_usage(
        &self,
        session: &Session,
        template_id: i64,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    fn list_pages(
        &self,
        session: &Session,
    ) -> impl Future<Output = Result<Vec<Destination>, ApiError>> + Send;
}

/// List endpoints answer with a bare array or a `{ "data": [...] }` envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListBody<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { data: items } => items,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemBody<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> ItemBody<T> {
    fn into_inner(self) -> T {
        match self {
            ItemBody::Wrapped { data } | ItemBody::Bare(data) => data,
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(ApiError::from)
}

fn decode_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, ApiError> {
    decode::<ListBody<T>>(body).map(ListBody::into_vec)
}

fn decode_item<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    decode::<ItemBody<T>>(body).map(ItemBody::into_inner)
}

/// Async client for the scheduling API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
    timeouts: Timeouts,
}

impl ApiClient {
    /// Create a client; the read tier is the default timeout for every call
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeouts.read).build()?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            http,
            timeouts: config.timeouts,
        })
    }

    /// Returns the base URL configured for this client.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a file to the media library under the upload timeout
    pub async fn upload_media(
        &self,
        session: &Session,
        file: &UploadFile,
    ) -> Result<MediaUpload, ApiError> {
        let form = multipart::Form::new()
            .text("user_id", session.user_id.to_string())
            .part("file", file_part(file)?);

        let request = self
            .http
            .post(self.url("/media/upload"))
            .timeout(self.timeouts.for_tier(RequestTier::Upload))
            .multipart(form);

        let body = Self::read_body(self.authorized(session, request).send().await?).await?;
        decode_item(&body)
    }

    fn publish_form(request: &PublishRequest) -> Result<multipart::Form, ApiError> {
        let mut form = multipart::Form::new();
        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }
        for file in &request.files {
            form = form.part("files", file_part(file)?);
        }
        Ok(form)
    }

    /// Body of a 2xx response, or the status and body as an error
    async fn read_body(response: Response) -> Result<String, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::UnexpectedStatus { status, body })
    }

    fn authorized(&self, session: &Session, request: RequestBuilder) -> RequestBuilder {
        if let Some(bearer) = session.bearer() {
            request.header(reqwest::header::AUTHORIZATION, bearer)
        } else {
            request
        }
    }
}

fn file_part(file: &UploadFile) -> Result<multipart::Part, ApiError> {
    let part = multipart::Part::bytes(file.data.to_vec())
        .file_name(file.file_name.clone())
        .mime_str(&file.mime_type)?;
    Ok(part)
}

impl PostBackend for ApiClient {
    async fn create_post(
        &self,
        session: &Session,
        request: &PublishRequest,
    ) -> Result<PublishResponse, ApiError> {
        let builder = self
            .http
            .post(self.url("/posts"))
            .timeout(self.timeouts.for_tier(RequestTier::Publish));

        let builder = if request.is_multipart() {
            builder.multipart(Self::publish_form(request)?)
        } else {
            builder.json(request)
        };

        debug!(
            "POST /posts page={} platform={} type={}",
            request.page_id,
            request.platform,
            request.post_type.as_str()
        );

        let body = Self::read_body(self.authorized(session, builder).send().await?).await?;
        PublishResponse::from_body(&body)
    }

    async fn list_posts(
        &self,
        session: &Session,
        filter: &PostFilter,
    ) -> Result<Vec<PersistedPost>, ApiError> {
        let request = self.http.get(self.url("/posts")).query(&filter.query(session));
        let body = Self::read_body(self.authorized(session, request).send().await?).await?;
        decode_list(&body)
    }

    async fn get_post(&self, session: &Session, post_id: i64) -> Result<PersistedPost, ApiError> {
        let request = self.http.get(self.url(&format!("/posts/{}", post_id)));
        let body = Self::read_body(self.authorized(session, request).send().await?).await?;
        decode_item(&body)
    }

    async fn delete_post(&self, session: &Session, post_id: i64) -> Result<(), ApiError> {
        let request = self.http.delete(self.url(&format!("/posts/{}", post_id)));
        Self::read_body(self.authorized(session, request).send().await?).await?;
        Ok(())
    }

    async fn increment_template_usage(
        &self,
        session: &Session,
        template_id: i64,
    ) -> Result<(), ApiError> {
        let url = self.url(&format!("/templates/{}/increment-usage", template_id));
        let request = self.http.patch(url);
        Self::read_body(self.authorized(session, request).send().await?).await?;
        Ok(())
    }

    async fn list_pages(&self, session: &Session) -> Result<Vec<Destination>, ApiError> {
        let request = self
            .http
            .get(self.url("/pages"))
            .query(&[("user_id", session.user_id.to_string())]);
        let body = Self::read_body(self.authorized(session, request).send().await?).await?;
        decode_list(&body)
    }
}
