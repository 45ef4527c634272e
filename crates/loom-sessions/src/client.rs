// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session client: composes the tracker, flush task, signal coordinator and
//! startup session.

use std::sync::Arc;

use tracing::info;

use crate::config::SessionTrackingConfig;
use crate::context::SessionContext;
use crate::error::{Result, SessionsSdkError};
use crate::publisher::{HttpPublisher, Publisher};
use crate::signal::{
	platform_signals, CoordinatorState, CoordinatorStateHandle, SignalCapability, SignalCoordinator,
};
use crate::startup::send_startup_session;
use crate::tracker::SessionTracker;

struct SessionClientInner {
	config: Arc<SessionTrackingConfig>,
	tracker: Arc<SessionTracker>,
	startup_context: SessionContext,
	coordinator_state: CoordinatorStateHandle,
}

/// Client for tracking sessions.
///
/// Create one per process, early in `main`, and share it (it is cheap to
/// clone) with everything that starts sessions.
///
/// # Example
///
/// ```ignore
/// use loom_sessions::{SessionClient, SessionContext, SessionTrackingConfig};
///
/// let config = SessionTrackingConfig::builder()
///     .api_key("your_api_key")
///     .release_stage("production")
///     .app_version(env!("CARGO_PKG_VERSION"))
///     .build()?;
///
/// let sessions = SessionClient::start(config)?;
///
/// // Per request or job:
/// let ctx = sessions.start_session(&SessionContext::background());
/// ctx.scope(handle_request()).await;
/// ```
#[derive(Clone)]
pub struct SessionClient {
	inner: Arc<SessionClientInner>,
}

impl SessionClient {
	/// Starts session tracking with the platform's signal handling.
	///
	/// Must be called inside a tokio runtime with the signal and time drivers
	/// enabled.
	pub fn start(config: SessionTrackingConfig) -> Result<Self> {
		ensure_runtime()?;
		let signals = platform_signals()?;
		Self::start_with_signals(config, signals)
	}

	/// Starts session tracking with an explicit signal capability.
	///
	/// Pass [`crate::NoopSignals`] on sandboxed runtimes that forbid signal
	/// handlers.
	pub fn start_with_signals(
		config: SessionTrackingConfig,
		signals: Box<dyn SignalCapability>,
	) -> Result<Self> {
		let config = Arc::new(config);
		let publisher: Arc<dyn Publisher> = Arc::new(HttpPublisher::new(Arc::clone(&config)));
		Self::start_with_publisher(config, publisher, signals)
	}

	/// Starts session tracking with a custom publisher.
	pub fn start_with_publisher(
		config: Arc<SessionTrackingConfig>,
		publisher: Arc<dyn Publisher>,
		signals: Box<dyn SignalCapability>,
	) -> Result<Self> {
		ensure_runtime()?;

		let tracker = Arc::new(SessionTracker::new(
			Arc::clone(&config),
			Arc::clone(&publisher),
		));
		tracker.spawn();

		let coordinator = SignalCoordinator::new(Arc::clone(&tracker), signals);
		let coordinator_state = coordinator.state();
		coordinator.spawn();

		let startup_context = send_startup_session(&config, config.resolved_role(), publisher);

		info!(
			endpoint = %config.endpoint,
			publish_interval_ms = config.publish_interval.as_millis() as u64,
			"Session client started"
		);

		Ok(Self {
			inner: Arc::new(SessionClientInner {
				config,
				tracker,
				startup_context,
				coordinator_state,
			}),
		})
	}

	/// Starts a session and returns `ctx` with the session attached.
	pub fn start_session(&self, ctx: &SessionContext) -> SessionContext {
		self.inner.tracker.start_session(ctx)
	}

	/// Context carrying the startup session, or a bare context when none was
	/// sent.
	pub fn startup_context(&self) -> &SessionContext {
		&self.inner.startup_context
	}

	pub fn config(&self) -> &SessionTrackingConfig {
		&self.inner.config
	}

	pub fn tracker(&self) -> &Arc<SessionTracker> {
		&self.inner.tracker
	}

	pub fn coordinator_state(&self) -> CoordinatorState {
		self.inner.coordinator_state.get()
	}

	/// Publishes pending sessions now.
	pub async fn flush(&self) -> Result<()> {
		self.inner.tracker.flush().await
	}

	/// Publishes pending sessions and stops tracking.
	///
	/// For orderly shutdowns that do not go through a termination signal.
	pub async fn shutdown(&self) {
		self.inner.tracker.flush_and_stop().await;
		info!("Session client shutdown");
	}
}

fn ensure_runtime() -> Result<()> {
	tokio::runtime::Handle::try_current()
		.map(|_| ())
		.map_err(|_| SessionsSdkError::NoRuntime)
}
