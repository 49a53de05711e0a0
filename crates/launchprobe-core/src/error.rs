//! Error types for LaunchProbe

use crate::event::Phase;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which HTTP call of a probe run produced a status error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `GET /build/gh/{repo}/{ref}`
    Build,
    /// `GET {url}/api`
    HealthCheck,
    /// `POST {url}/api/shutdown`
    Shutdown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Build => "build request",
            Stage::HealthCheck => "health check",
            Stage::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error during {stage}: status {status_code}: {body}")]
    Http {
        stage: Stage,
        status_code: u16,
        body: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(
        "Launch failed: build stream closed without a ready event ({events_seen} events seen{})",
        .last_phase.as_ref().map(|p| format!(", last phase {}", p)).unwrap_or_default()
    )]
    LaunchFailure {
        events_seen: usize,
        last_phase: Option<Phase>,
    },

    #[error("Launch timed out after {0:?}")]
    LaunchTimeout(Duration),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for failures of the HTTP exchange itself (bad status or broken transport)
    pub fn is_http(&self) -> bool {
        matches!(self, Error::Http { .. } | Error::Transport(_))
    }

    /// The stage that returned a bad status, if this is a status error
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Http { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
