//! Explicit session context threaded through the composer and API client

/// Who is acting, and with which bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Value for the `Authorization` header, if the session carries a token
    pub fn bearer(&self) -> Option<String> {
        self.access_token
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_treated_as_absent() {
        let session = Session::new(3).with_token("  ");
        assert_eq!(session.access_token(), None);
        assert_eq!(session.bearer(), None);

        let session = Session::new(3).with_token("abc");
        assert_eq!(session.bearer().as_deref(), Some("Bearer abc"));
    }
}
