//! Launched session references

use crate::event::Phase;
use serde::Serialize;
use std::fmt;

/// Address and credential of a launched session.
///
/// The session itself is owned by the remote service; this is only what the
/// client needs to reach it and to ask for its shutdown.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionRef {
    url: String,
    token: String,
}

impl SessionRef {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }

    /// Session URL exactly as reported by the service
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `{url}/api`
    pub fn api_url(&self) -> String {
        format!("{}/api", self.url.trim_end_matches('/'))
    }

    /// `{url}/api/shutdown`
    pub fn shutdown_url(&self) -> String {
        format!("{}/api/shutdown", self.url.trim_end_matches('/'))
    }

    /// Value of the `Authorization` header for session calls
    pub fn authorization(&self) -> String {
        format!("token {}", self.token)
    }
}

impl fmt::Debug for SessionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRef")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Result of the `POST {url}/api/shutdown` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownOutcome {
    pub status: u16,
}

impl ShutdownOutcome {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Summary of a completed probe run, for the caller to assert against
#[derive(Debug, Clone, Serialize)]
pub struct SessionHandle {
    /// Session URL from the `ready` event
    pub url: String,

    /// JSON body of `GET {url}/api`
    pub api_info: serde_json::Value,

    pub shutdown: ShutdownOutcome,

    /// Phases observed on the build stream, in order, ending with `ready`
    pub phases: Vec<Phase>,
}

impl SessionHandle {
    /// True when the session API body has a `version` key, whatever its type
    pub fn has_version(&self) -> bool {
        self.api_info.get("version").is_some()
    }

    /// The `version` reported by the session API, when it is a string
    pub fn version(&self) -> Option<&str> {
        self.api_info.get("version").and_then(|v| v.as_str())
    }
}
