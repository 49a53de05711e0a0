//! LaunchProbe CLI
//!
//! Asks a BinderHub-style build/launch service to build and start a repository,
//! waits for the session to come up, checks that its API answers, and shuts it
//! down again. Exits non-zero if any step fails.
//!
//! Usage:
//! ```bash
//! # Against a local deployment
//! BINDER_URL=http://localhost:8585 launchprobe
//!
//! # A different repository and ref, with a config file
//! launchprobe --config probe.yaml --repo binder-examples/conda --ref main
//! ```

mod config;

use anyhow::Context;
use clap::Parser;
use config::ProbeConfig;
use launchprobe_core::SessionHandle;
use launchprobe_egress::{LaunchProbe, LaunchProbeConfig, run_with_deadline};
use std::time::Duration;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// LaunchProbe - end-to-end launch check for a build/launch service
#[derive(Parser)]
#[command(name = "launchprobe")]
#[command(about = "Build, launch, verify and shut down one session", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, value_name = "FILE", env = "LAUNCHPROBE_CONFIG")]
    config: Option<String>,

    /// Base URL of the build/launch service
    #[arg(long, value_name = "URL")]
    binder_url: Option<String>,

    /// Repository to build, as `owner/name`
    #[arg(long, value_name = "REPO")]
    repo: Option<String>,

    /// Branch, tag or commit to build
    #[arg(long = "ref", value_name = "REF")]
    git_ref: Option<String>,

    /// Overall deadline for the whole run
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    /// Flags take precedence over file and environment
    fn apply_to(self, config: &mut ProbeConfig) {
        if let Some(url) = self.binder_url {
            config.binder_url = Some(url);
        }
        if let Some(repo) = self.repo {
            config.repo = repo;
        }
        if let Some(git_ref) = self.git_ref {
            config.git_ref = git_ref;
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Connection pool chatter is noise even at debug
    let filter = EnvFilter::new(format!("{}", log_level))
        .add_directive("hyper_util=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    let mut config = match cli.config.take() {
        Some(path) => ProbeConfig::from_file(&path)?,
        None => ProbeConfig::default(),
    };
    config.merge_env();
    cli.apply_to(&mut config);

    init_tracing(&config.logging.level)?;
    config.validate()?;

    let base_url = config
        .binder_url
        .clone()
        .context("binder_url is required")?;
    info!(
        binder_url = %base_url,
        repo = %config.repo,
        git_ref = %config.git_ref,
        timeout_secs = config.timeout_secs,
        "Starting launch probe"
    );

    let probe = LaunchProbe::new(
        LaunchProbeConfig::new(base_url).with_client_config(config.client_config()),
    )?;
    let handle = run_with_deadline(
        &probe,
        &config.repo,
        &config.git_ref,
        Duration::from_secs(config.timeout_secs),
    )
    .await
    .with_context(|| format!("Launch of {}@{} failed", config.repo, config.git_ref))?;

    println!("{}", summarize(&handle)?);
    Ok(())
}

/// Check what the caller is responsible for and render the one-line report
fn summarize(handle: &SessionHandle) -> anyhow::Result<String> {
    anyhow::ensure!(
        handle.has_version(),
        "Session API response has no 'version'"
    );
    anyhow::ensure!(
        handle.shutdown.is_success(),
        "Session shutdown returned status {}",
        handle.shutdown.status
    );

    let version = match handle.version() {
        Some(version) => version.to_string(),
        None => handle.api_info["version"].to_string(),
    };
    Ok(format!(
        "ok: {} (server version {}, shutdown status {})",
        handle.url, version, handle.shutdown.status
    ))
}
