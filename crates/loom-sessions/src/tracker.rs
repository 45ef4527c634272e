// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session aggregation and periodic publishing.
//!
//! Two locks are involved. The buffer mutex guards the pending sessions and is
//! only ever held for an append or a swap-to-empty, so session starts never
//! wait on the network. The flush lock serializes publishes: every flush takes
//! it, drains the buffer, and holds it until its send completes. The shutdown
//! flush waits up to `shutdown_wait` for an in-flight publish to release the
//! lock; past that it drains and sends its own batch alongside. Draining is a
//! single swap either way, so no session is sent twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use loom_sessions_core::Session;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionTrackingConfig;
use crate::context::SessionContext;
use crate::error::Result;
use crate::publisher::Publisher;

struct Pending {
	sessions: Vec<Session>,
	accepting: bool,
}

/// Buffers started sessions and publishes them in batches.
///
/// One tracker exists per process. It is created by the client at startup and
/// shared with the flush task and the signal coordinator.
pub struct SessionTracker {
	config: Arc<SessionTrackingConfig>,
	publisher: Arc<dyn Publisher>,
	pending: Mutex<Pending>,
	flush_lock: tokio::sync::Mutex<()>,
	stopped: AtomicBool,
	stop_notify: Notify,
}

impl SessionTracker {
	/// Creates a tracker. The periodic flush does not run until [`Self::spawn`].
	pub fn new(config: Arc<SessionTrackingConfig>, publisher: Arc<dyn Publisher>) -> Self {
		Self {
			config,
			publisher,
			pending: Mutex::new(Pending {
				sessions: Vec::new(),
				accepting: true,
			}),
			flush_lock: tokio::sync::Mutex::new(()),
			stopped: AtomicBool::new(false),
			stop_notify: Notify::new(),
		}
	}

	/// Starts a session and returns `ctx` with the session attached.
	///
	/// Never blocks on I/O. After [`Self::flush_and_stop`] the session is still
	/// attached to the returned context but is no longer buffered.
	pub fn start_session(&self, ctx: &SessionContext) -> SessionContext {
		let session = Session::new();
		{
			let mut pending = self.pending();
			if pending.accepting {
				pending.sessions.push(session.clone());
			} else {
				debug!(session_id = %session.id, "Tracker stopped, session not buffered");
			}
		}
		ctx.with_session(session)
	}

	/// Number of sessions waiting to be published.
	pub fn pending_len(&self) -> usize {
		self.pending().sessions.len()
	}

	/// Returns true once [`Self::flush_and_stop`] has been called.
	pub fn is_stopped(&self) -> bool {
		self.stopped.load(Ordering::SeqCst)
	}

	/// Drains the buffer and publishes it.
	///
	/// The batch is dropped whether or not the publish succeeds.
	pub async fn flush(&self) -> Result<()> {
		let _flushing = self.flush_lock.lock().await;
		let sessions = self.take_pending();
		if sessions.is_empty() {
			return Ok(());
		}

		debug!(count = sessions.len(), "Flushing session batch");
		self.publisher.publish(sessions).await
	}

	/// Stops the periodic flush and publishes whatever is pending.
	///
	/// Waits up to the configured `shutdown_wait` for an in-flight periodic
	/// publish to finish first. Returns once the final batch has been sent or
	/// the attempt has failed; failures go to the configured logger. Safe to
	/// call more than once.
	pub async fn flush_and_stop(&self) {
		self.stopped.store(true, Ordering::SeqCst);
		self.stop_notify.notify_one();

		let wait = self.config.shutdown_wait;
		let _flushing = match tokio::time::timeout(wait, self.flush_lock.lock()).await {
			Ok(guard) => Some(guard),
			Err(_) => {
				warn!(
					shutdown_wait_ms = wait.as_millis() as u64,
					"In-flight publish still running, sending shutdown batch alongside it"
				);
				None
			}
		};
		let sessions = {
			let mut pending = self.pending();
			pending.accepting = false;
			std::mem::take(&mut pending.sessions)
		};

		if sessions.is_empty() {
			debug!("No pending sessions at shutdown");
			return;
		}

		info!(count = sessions.len(), "Publishing pending sessions before shutdown");
		if let Err(e) = self.publisher.publish(sessions).await {
			self.config
				.logf(format_args!("failed to publish sessions at shutdown: {e}"));
		}
	}

	/// Spawns the periodic flush loop on the current tokio runtime.
	pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
		let tracker = Arc::clone(self);
		tokio::spawn(async move { tracker.run().await })
	}

	/// Runs the periodic flush loop until the tracker is stopped.
	pub async fn run(&self) {
		let interval = self.config.publish_interval;
		info!(
			publish_interval_ms = interval.as_millis() as u64,
			"Starting session flush task"
		);

		loop {
			tokio::select! {
				_ = tokio::time::sleep(interval) => {
					if self.is_stopped() {
						break;
					}

					if let Err(e) = self.flush().await {
						self.config.logf(format_args!("failed to publish sessions: {e}"));
					}
				}
				_ = self.stop_notify.notified() => break,
			}
		}

		info!("Session flush task stopped");
	}

	fn take_pending(&self) -> Vec<Session> {
		std::mem::take(&mut self.pending().sessions)
	}

	// A panic while holding the buffer lock leaves a plain Vec behind, which is
	// still usable.
	fn pending(&self) -> MutexGuard<'_, Pending> {
		self.pending.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use std::sync::atomic::AtomicUsize;
	use std::time::Duration;

	use super::*;
	use crate::error::SessionsSdkError;

	/// Records every batch it is asked to publish.
	#[derive(Default)]
	pub struct MockPublisher {
		pub calls: AtomicUsize,
		pub batches: Mutex<Vec<Vec<Session>>>,
		pub should_fail: AtomicBool,
		pub delay: Option<Duration>,
	}

	impl MockPublisher {
		pub fn with_delay(delay: Duration) -> Self {
			Self {
				delay: Some(delay),
				..Default::default()
			}
		}

		pub fn set_should_fail(&self, fail: bool) {
			self.should_fail.store(fail, Ordering::SeqCst);
		}

		pub fn batches(&self) -> Vec<Vec<Session>> {
			self.batches.lock().unwrap().clone()
		}

		pub fn total_published(&self) -> usize {
			self.batches().iter().map(Vec::len).sum()
		}
	}

	#[async_trait::async_trait]
	impl Publisher for MockPublisher {
		async fn publish(&self, sessions: Vec<Session>) -> Result<()> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}
			if self.should_fail.load(Ordering::SeqCst) {
				return Err(SessionsSdkError::ServerError {
					status: 500,
					message: "mock failure".to_string(),
				});
			}
			self.batches.lock().unwrap().push(sessions);
			Ok(())
		}
	}
}
