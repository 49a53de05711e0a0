//! Live launch test against a real build/launch service
//!
//! Requires BINDER_URL in the environment or a .env file, and is ignored by default.
//!
//! Run with: cargo test --package launchprobe_integration_tests --test live_binder -- --ignored

use dotenv::dotenv;
use launchprobe_egress::{DEFAULT_DEADLINE_SECS, LaunchProbe, LaunchProbeConfig, run_with_deadline};
use launchprobe_integration_tests::init_tracing;
use std::env;
use std::time::Duration;

fn get_binder_url() -> String {
    dotenv().ok();
    env::var("BINDER_URL").expect("BINDER_URL must be set")
}

/// Launch an image that has most likely been built already
#[tokio::test]
#[ignore] // Run with --ignored flag
async fn test_launch_binder() {
    init_tracing();

    // Known good version of this repo
    let repo = "binder-examples/requirements";
    let git_ref = "50533eb";

    let probe = LaunchProbe::new(LaunchProbeConfig::new(get_binder_url())).unwrap();
    let handle = run_with_deadline(
        &probe,
        repo,
        git_ref,
        Duration::from_secs(DEFAULT_DEADLINE_SECS),
    )
    .await
    .unwrap();

    assert!(handle.has_version(), "session API reported no version");
    assert!(handle.shutdown.is_success());
    println!("✓ Launched and shut down {}", handle.url);
}
