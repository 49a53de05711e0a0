//! Build stream events
//!
//! The build endpoint answers with a server-sent-event style body. Each line that
//! starts with `data:` carries one JSON object describing the current phase of the
//! build/launch pipeline. Only the `ready` phase carries the session URL and token.

use crate::{Error, Result, session::SessionRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal prefix of lines that carry an event payload
pub const DATA_PREFIX: &str = "data:";

/// Phase tag of a build event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phase {
    Waiting,
    Fetching,
    Unknown,
    Building,
    Pushing,
    Built,
    Launching,
    Ready,
    Failed,
    /// Any tag this client does not know about
    Other(String),
}

impl Phase {
    pub fn as_str(&self) -> &str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Fetching => "fetching",
            Phase::Unknown => "unknown",
            Phase::Building => "building",
            Phase::Pushing => "pushing",
            Phase::Built => "built",
            Phase::Launching => "launching",
            Phase::Ready => "ready",
            Phase::Failed => "failed",
            Phase::Other(tag) => tag,
        }
    }
}

impl From<String> for Phase {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "waiting" => Phase::Waiting,
            "fetching" => Phase::Fetching,
            "unknown" => Phase::Unknown,
            "building" => Phase::Building,
            "pushing" => Phase::Pushing,
            "built" => Phase::Built,
            "launching" => Phase::Launching,
            "ready" => Phase::Ready,
            "failed" => Phase::Failed,
            _ => Phase::Other(tag),
        }
    }
}

impl From<Phase> for String {
    fn from(phase: Phase) -> Self {
        phase.as_str().to_string()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `data:` payload of the build stream.
///
/// Only `phase` is inspected on every event, and only when it is a string. Every
/// other field stays as raw JSON until a `ready` event asks for `url` and `token`,
/// so progress events with unexpected shapes never stop the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildEvent {
    pub phase: Option<Phase>,
    payload: serde_json::Map<String, serde_json::Value>,
}

impl BuildEvent {
    pub fn from_payload(payload: serde_json::Map<String, serde_json::Value>) -> Self {
        let phase = payload
            .get("phase")
            .and_then(|p| p.as_str())
            .map(|p| Phase::from(p.to_string()));
        Self { phase, payload }
    }

    /// Parse one line of the build stream.
    ///
    /// Returns `Ok(None)` for lines that do not start with `data:` (blank keep-alives,
    /// comments, `event:` framing). The payload after the first colon must be a JSON
    /// object; anything else is a parse error.
    pub fn from_data_line(line: &str) -> Result<Option<Self>> {
        if !line.starts_with(DATA_PREFIX) {
            return Ok(None);
        }

        let payload = match line.split_once(':') {
            Some((_, rest)) => rest,
            None => return Ok(None),
        };

        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(payload)
            .map(|object| Some(Self::from_payload(object)))
            .map_err(|e| Error::Parse(format!("Invalid build event payload {:?}: {}", payload, e)))
    }

    pub fn is_ready(&self) -> bool {
        self.phase == Some(Phase::Ready)
    }

    /// Human readable progress text, when the service sent it as a string
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|m| m.as_str())
    }

    /// Any field of the payload, untyped
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }

    /// Extract the session reference from a `ready` event.
    ///
    /// A ready event without a string `url` or `token` breaks the service contract
    /// and is a parse error.
    pub fn into_session(self) -> Result<SessionRef> {
        let url = self.required_str("url")?;
        let token = self.required_str("token")?;
        Ok(SessionRef::new(url, token))
    }

    fn required_str(&self, key: &str) -> Result<&str> {
        match self.payload.get(key) {
            Some(serde_json::Value::String(value)) => Ok(value),
            Some(other) => Err(Error::Parse(format!(
                "Ready event '{}' is not a string: {}",
                key, other
            ))),
            None => Err(Error::Parse(format!("Ready event is missing '{}'", key))),
        }
    }
}
