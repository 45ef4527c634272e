// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process role detection and the startup session.
//!
//! A crash monitor may wrap the application: it re-executes the same binary as
//! a child and watches it for fatal crashes. Both processes run the same
//! startup code, so the monitor marks the child's environment with
//! [`MONITOR_PROCESS_ENV`]. The marker's value is opaque; only its presence
//! matters. Both binaries must agree on the variable name, which is why it is
//! exported here and why [`ProcessRole::mark_monitor`] exists. Callers that
//! know their role can skip the environment entirely by setting it on the
//! configuration.

use std::ffi::OsString;
use std::process::Command;
use std::sync::Arc;

use loom_sessions_core::Session;
use tracing::debug;

use crate::config::SessionTrackingConfig;
use crate::context::SessionContext;
use crate::publisher::Publisher;

/// Environment variable marking the monitor's re-execution of the binary.
pub const MONITOR_PROCESS_ENV: &str = "LOOM_SESSIONS_MONITOR_PROCESS";

/// Which side of a monitor/application pair this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
	/// The user application. Owns session publication.
	Application,
	/// The crash monitor's re-execution. Must not publish sessions.
	Monitor,
}

impl ProcessRole {
	/// Detects the role from the process environment.
	pub fn detect() -> Self {
		Self::from_lookup(|key| std::env::var_os(key))
	}

	/// Detects the role from an arbitrary environment lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
		match lookup(MONITOR_PROCESS_ENV) {
			Some(_) => ProcessRole::Monitor,
			None => ProcessRole::Application,
		}
	}

	/// Sets the marker on a command the monitor is about to launch.
	pub fn mark_monitor(command: &mut Command) -> &mut Command {
		command.env(MONITOR_PROCESS_ENV, "1")
	}

	pub fn is_monitor(self) -> bool {
		self == ProcessRole::Monitor
	}
}

/// Sends the session for this process launch and returns a context carrying it.
///
/// Returns a bare background context, without any network activity, when
/// auto-capture is disabled or when `role` is [`ProcessRole::Monitor`].
/// Otherwise the single-session batch is published on a spawned task and the
/// call returns immediately; a publish failure is logged, never surfaced.
pub fn send_startup_session(
	config: &Arc<SessionTrackingConfig>,
	role: ProcessRole,
	publisher: Arc<dyn Publisher>,
) -> SessionContext {
	let ctx = SessionContext::background();
	if !config.is_auto_capture_sessions() {
		debug!("Automatic session capture disabled, no startup session");
		return ctx;
	}
	if role.is_monitor() {
		debug!("Running as crash monitor, startup session left to the application");
		return ctx;
	}

	let session = Session::new();
	match tokio::runtime::Handle::try_current() {
		Ok(runtime) => {
			let config = Arc::clone(config);
			let batch = vec![session.clone()];
			runtime.spawn(async move {
				if let Err(e) = publisher.publish(batch).await {
					config.logf(format_args!("failed to publish startup session: {e}"));
				}
			});
		}
		Err(_) => {
			config.logf(format_args!(
				"no tokio runtime running, startup session {} not published",
				session.id
			));
		}
	}

	debug!(session_id = %session.id, "Startup session created");
	ctx.with_session(session)
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::Ordering;
	use std::time::Duration;

	use super::*;
	use crate::logger::test_support::RecordingLogger;
	use crate::tracker::test_support::MockPublisher;

	fn config(auto_capture: bool, logger: Arc<RecordingLogger>) -> Arc<SessionTrackingConfig> {
		Arc::new(
			SessionTrackingConfig::builder()
				.api_key("key")
				.auto_capture_sessions(auto_capture)
				.logger(logger)
				.build()
				.unwrap(),
		)
	}

	#[test]
	fn test_marker_presence_means_monitor() {
		let role = ProcessRole::from_lookup(|key| {
			(key == MONITOR_PROCESS_ENV).then(|| OsString::from("anything"))
		});
		assert_eq!(role, ProcessRole::Monitor);
	}

	#[test]
	fn test_empty_marker_still_means_monitor() {
		let role = ProcessRole::from_lookup(|_| Some(OsString::new()));
		assert!(role.is_monitor());
	}

	#[test]
	fn test_missing_marker_means_application() {
		assert_eq!(ProcessRole::from_lookup(|_| None), ProcessRole::Application);
	}

	#[test]
	fn test_mark_monitor_sets_marker() {
		let mut command = Command::new("true");
		ProcessRole::mark_monitor(&mut command);

		let marked = command
			.get_envs()
			.any(|(key, value)| key == MONITOR_PROCESS_ENV && value.is_some());
		assert!(marked);
	}

	#[tokio::test]
	async fn test_startup_session_published_for_application() {
		let publisher = Arc::new(MockPublisher::default());
		let ctx = send_startup_session(
			&config(true, Arc::default()),
			ProcessRole::Application,
			publisher.clone(),
		);

		let session = ctx.require_session().unwrap().clone();
		tokio::time::sleep(Duration::from_millis(20)).await;

		let batches = publisher.batches();
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0], vec![session]);
	}

	#[tokio::test]
	async fn test_auto_capture_disabled_sends_nothing() {
		let publisher = Arc::new(MockPublisher::default());
		let ctx = send_startup_session(
			&config(false, Arc::default()),
			ProcessRole::Application,
			publisher.clone(),
		);

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(ctx.session().is_none());
		assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_monitor_role_sends_nothing() {
		let publisher = Arc::new(MockPublisher::default());
		let ctx = send_startup_session(
			&config(true, Arc::default()),
			ProcessRole::Monitor,
			publisher.clone(),
		);

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(ctx.session().is_none());
		assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_startup_publish_failure_is_logged() {
		let logger = Arc::new(RecordingLogger::default());
		let publisher = Arc::new(MockPublisher::default());
		publisher.set_should_fail(true);

		let ctx = send_startup_session(
			&config(true, logger.clone()),
			ProcessRole::Application,
			publisher,
		);
		tokio::time::sleep(Duration::from_millis(20)).await;

		assert!(ctx.session().is_some());
		assert_eq!(logger.lines().len(), 1);
		assert!(logger.lines()[0].contains("startup session"));
	}

	#[test]
	fn test_without_runtime_context_still_carries_session() {
		let logger = Arc::new(RecordingLogger::default());
		let publisher = Arc::new(MockPublisher::default());

		let ctx = send_startup_session(
			&config(true, logger.clone()),
			ProcessRole::Application,
			publisher.clone(),
		);

		assert!(ctx.session().is_some());
		assert_eq!(publisher.calls.load(Ordering::SeqCst), 0);
		assert!(logger.lines()[0].contains("no tokio runtime"));
	}
}
