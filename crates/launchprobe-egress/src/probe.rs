//! Launch probe
//!
//! Drives one build-and-launch round trip against the service:
//! 1. `GET {base}/build/gh/{repo}/{ref}` and follow the streamed build events
//! 2. Stop at the first `ready` event and take its session URL and token
//! 3. `GET {url}/api` with `Authorization: token {token}`
//! 4. `POST {url}/api/shutdown` with the same header
//!
//! Every step runs strictly after the previous one. Nothing is retried.

use crate::{
    Error, Result,
    client::{HttpClientConfig, create_client},
    lines::EventLines,
};
use futures::StreamExt;
use launchprobe_core::{BuildEvent, Phase, SessionHandle, SessionRef, ShutdownOutcome, Stage};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Overall deadline used when the caller does not pick one
pub const DEFAULT_DEADLINE_SECS: u64 = 497;

/// Launch probe configuration
#[derive(Debug, Clone)]
pub struct LaunchProbeConfig {
    /// Base URL of the build/launch service
    pub base_url: String,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl LaunchProbeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

/// Client for one build/launch/verify/shutdown round trip
pub struct LaunchProbe {
    config: LaunchProbeConfig,
    client: Client,
}

impl LaunchProbe {
    pub fn new(config: LaunchProbeConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    /// `{base}/build/gh/{repo_spec}/{git_ref}`; both segments are used verbatim
    pub fn build_url(&self, repo_spec: &str, git_ref: &str) -> String {
        format!(
            "{}/build/gh/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            repo_spec,
            git_ref
        )
    }

    /// Build and launch `repo_spec` at `git_ref`, check the session answers, then shut it down
    #[instrument(skip(self))]
    pub async fn run(&self, repo_spec: &str, git_ref: &str) -> Result<SessionHandle> {
        let (session, phases) = self.wait_for_ready(repo_spec, git_ref).await?;
        let api_info = self.check_health(&session).await?;
        let shutdown = self.shutdown(&session).await?;

        info!(url = %session.url(), "Session verified and shut down");

        Ok(SessionHandle {
            url: session.url().to_string(),
            api_info,
            shutdown,
            phases,
        })
    }

    /// Follow the build stream until the session is ready.
    ///
    /// Returns the session reference and the phase transitions seen on the way.
    /// The stream connection is dropped as soon as `ready` arrives.
    #[instrument(skip(self))]
    pub async fn wait_for_ready(
        &self,
        repo_spec: &str,
        git_ref: &str,
    ) -> Result<(SessionRef, Vec<Phase>)> {
        let url = self.build_url(repo_spec, git_ref);
        info!(url = %url, "Requesting build");

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|e| transport_error(Stage::Build, e))?;

        debug!(status = %response.status(), "Build stream opened");

        if !response.status().is_success() {
            return Err(status_error(Stage::Build, response).await);
        }

        let mut lines = EventLines::new(Box::pin(response.bytes_stream()));
        let mut phases: Vec<Phase> = Vec::new();
        let mut events_seen = 0usize;
        let mut session: Option<SessionRef> = None;

        while let Some(line) = lines.next().await {
            let line = line?;
            let Some(event) = BuildEvent::from_data_line(&line)? else {
                continue;
            };
            events_seen += 1;

            if let Some(message) = event.message() {
                debug!(message = %message.trim_end(), "Build progress");
            }

            let Some(phase) = event.phase.clone() else {
                continue;
            };
            if phases.last() != Some(&phase) {
                info!(phase = %phase, "Build phase changed");
                phases.push(phase);
            }

            if event.is_ready() {
                session = Some(event.into_session()?);
                break;
            }
        }

        match session {
            Some(session) => {
                info!(url = %session.url(), events_seen, "Session ready");
                Ok((session, phases))
            }
            None => {
                warn!(events_seen, "Build stream closed without a ready event");
                Err(Error::LaunchFailure {
                    events_seen,
                    last_phase: phases.last().cloned(),
                })
            }
        }
    }

    /// `GET {url}/api`; anything but 200 is an error. Returns the JSON body.
    #[instrument(skip(self))]
    pub async fn check_health(&self, session: &SessionRef) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(session.api_url())
            .header("Authorization", session.authorization())
            .send()
            .await
            .map_err(|e| transport_error(Stage::HealthCheck, e))?;

        if response.status() != StatusCode::OK {
            return Err(status_error(Stage::HealthCheck, response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(Stage::HealthCheck, e))?;
        let api_info: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("Session API returned non-JSON body: {}", e)))?;

        debug!(version = ?api_info.get("version"), "Session API answered");
        Ok(api_info)
    }

    /// `POST {url}/api/shutdown`; anything but 200 is an error
    #[instrument(skip(self))]
    pub async fn shutdown(&self, session: &SessionRef) -> Result<ShutdownOutcome> {
        let response = self
            .client
            .post(session.shutdown_url())
            .header("Authorization", session.authorization())
            .send()
            .await
            .map_err(|e| transport_error(Stage::Shutdown, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(status_error(Stage::Shutdown, response).await);
        }

        debug!("Session shutdown accepted");
        Ok(ShutdownOutcome {
            status: status.as_u16(),
        })
    }
}

/// Run the probe under an overall wall-clock deadline.
///
/// On expiry the in-flight request is dropped where it stands; no shutdown is
/// attempted.
pub async fn run_with_deadline(
    probe: &LaunchProbe,
    repo_spec: &str,
    git_ref: &str,
    deadline: Duration,
) -> Result<SessionHandle> {
    match tokio::time::timeout(deadline, probe.run(repo_spec, git_ref)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(deadline = ?deadline, "Launch probe deadline expired");
            Err(Error::LaunchTimeout(deadline))
        }
    }
}

fn transport_error(stage: Stage, e: reqwest::Error) -> Error {
    Error::Transport(format!("{} failed: {}", stage, e))
}

async fn status_error(stage: Stage, response: reqwest::Response) -> Error {
    let status_code = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error body".to_string());
    warn!(%stage, status_code, "Unexpected status");
    Error::Http {
        stage,
        status_code,
        body,
    }
}
