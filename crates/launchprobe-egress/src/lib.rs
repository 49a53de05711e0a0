//! LaunchProbe Egress
//!
//! This crate holds everything that talks to the build/launch service:
//! - HTTP client construction
//! - Line framing of the streamed build response
//! - The launch probe itself

pub mod client;
pub mod lines;
pub mod probe;

pub use launchprobe_core::{Error, Result};
pub use probe::{DEFAULT_DEADLINE_SECS, LaunchProbe, LaunchProbeConfig, run_with_deadline};
