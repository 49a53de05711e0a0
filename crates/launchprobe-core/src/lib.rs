//! LaunchProbe Core Types
//!
//! This crate provides the types shared by the probe and its callers:
//! - Build stream events and phases
//! - Session references and the summary handed back to the caller
//! - Core error types

pub mod error;
pub mod event;
pub mod session;

pub use error::{Error, Result, Stage};
pub use event::{BuildEvent, Phase};
pub use session::{SessionHandle, SessionRef, ShutdownOutcome};
