//! Environment-driven client configuration

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_PUBLISH_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS,
    DEFAULT_UPLOAD_TIMEOUT_SECS,
};
use crate::session::Session;

const API_BASE_ENV: &str = "POSTDESK_API_URL";
const API_TOKEN_ENV: &str = "POSTDESK_API_TOKEN";
const USER_ID_ENV: &str = "POSTDESK_USER_ID";
const READ_TIMEOUT_ENV: &str = "POSTDESK_READ_TIMEOUT_SECS";
const UPLOAD_TIMEOUT_ENV: &str = "POSTDESK_UPLOAD_TIMEOUT_SECS";
const PUBLISH_TIMEOUT_ENV: &str = "POSTDESK_PUBLISH_TIMEOUT_SECS";

const DEFAULT_USER_ID: i64 = 1;

/// Which timeout budget a request runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTier {
    /// List and detail fetches, deletes, usage counters
    Read,
    /// Media library uploads
    Upload,
    /// `POST /posts`, which may trigger platform publishes server side
    Publish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Duration,
    pub upload: Duration,
    pub publish: Duration,
}

impl Timeouts {
    pub fn for_tier(&self, tier: RequestTier) -> Duration {
        match tier {
            RequestTier::Read => self.read,
            RequestTier::Upload => self.upload,
            RequestTier::Publish => self.publish,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            upload: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            publish: Duration::from_secs(DEFAULT_PUBLISH_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub api_base: String,
    pub api_token: Option<String>,
    pub user_id: i64,
    pub timeouts: Timeouts,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset, invalid or non-positive values use defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base = lookup(API_BASE_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let api_token = lookup(API_TOKEN_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let user_id = lookup(USER_ID_ENV)
            .and_then(|v| v.trim().parse().ok())
            .filter(|v: &i64| *v > 0)
            .unwrap_or(DEFAULT_USER_ID);

        let timeouts = Timeouts {
            read: secs(&lookup, READ_TIMEOUT_ENV, DEFAULT_READ_TIMEOUT_SECS),
            upload: secs(&lookup, UPLOAD_TIMEOUT_ENV, DEFAULT_UPLOAD_TIMEOUT_SECS),
            publish: secs(&lookup, PUBLISH_TIMEOUT_ENV, DEFAULT_PUBLISH_TIMEOUT_SECS),
        };

        Self {
            api_base,
            api_token,
            user_id,
            timeouts,
        }
    }

    pub fn session(&self) -> Session {
        let session = Session::new(self.user_id);
        match &self.api_token {
            Some(token) => session.with_token(token.clone()),
            None => session,
        }
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default);
    Duration::from_secs(value)
}
