// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session tracking SDK for Rust applications.
//!
//! Records when units of application work start, aggregates them into
//! per-minute counts, and publishes those counts in the background. On SIGTERM
//! or SIGINT the pending sessions are flushed synchronously before the signal
//! is re-delivered, so the process still terminates exactly as it would have
//! without the SDK.
//!
//! # Quick Start
//!
//! ```ignore
//! use loom_sessions::{install_panic_hook, SessionClient, SessionContext, SessionTrackingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionTrackingConfig::builder()
//!         .api_key("your_api_key")
//!         .app_version(env!("CARGO_PKG_VERSION"))
//!         .build()?;
//!
//!     let sessions = SessionClient::start(config)?;
//!
//!     // Tag panics with the session of this launch.
//!     install_panic_hook(sessions.startup_context().clone());
//!
//!     // One session per request or job.
//!     let ctx = sessions.start_session(&SessionContext::background());
//!     ctx.scope(async {
//!         // ...
//!     })
//!     .await;
//!
//!     sessions.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Delivery
//!
//! Publishing is best effort. A failed publish drops its batch and is reported
//! through the configured [`SessionLogger`]; nothing is retried or persisted,
//! and no publish error ever reaches application code.

mod client;
mod config;
mod context;
mod error;
mod logger;
mod panic_hook;
mod publisher;
mod signal;
mod startup;
mod tracker;

pub use client::SessionClient;
pub use config::{
	env, SessionTrackingConfig, SessionTrackingConfigBuilder, DEFAULT_ENDPOINT,
	DEFAULT_PUBLISH_INTERVAL, DEFAULT_RELEASE_STAGE, DEFAULT_REQUEST_TIMEOUT,
	DEFAULT_SHUTDOWN_WAIT, NOTIFIER_NAME, NOTIFIER_URL, SDK_VERSION,
};
pub use context::SessionContext;
pub use error::{Result, SessionsSdkError};
pub use logger::{SessionLogger, TracingLogger};
pub use panic_hook::{install_panic_hook, PanicCorrelation};
pub use publisher::{HttpPublisher, Publisher};
#[cfg(not(unix))]
pub use signal::CtrlCSignals;
#[cfg(unix)]
pub use signal::UnixSignals;
pub use signal::{
	platform_signals, CoordinatorState, CoordinatorStateHandle, NoopSignals, SignalCapability,
	SignalCoordinator, TerminationSignal,
};
pub use startup::{send_startup_session, ProcessRole, MONITOR_PROCESS_ENV};
pub use tracker::SessionTracker;

// Re-export core types for convenience
pub use loom_sessions_core::{Session, SessionCount, SessionId, SessionPayload};
