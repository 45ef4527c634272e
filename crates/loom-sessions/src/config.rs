// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session tracking configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use loom_sessions_core::{AppInfo, DeviceInfo, NotifierInfo};
use reqwest::Client;
use tracing::warn;

use crate::error::{Result, SessionsSdkError};
use crate::logger::{SessionLogger, TracingLogger};
use crate::startup::ProcessRole;

/// SDK version for identification.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// SDK name for identification.
pub const NOTIFIER_NAME: &str = "loom-sessions-rust";
/// Where the SDK lives.
pub const NOTIFIER_URL: &str = "https://github.com/ghuntley/loom";

/// Default sessions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://sessions.bugsnag.com";
/// Default interval between automatic flushes.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);
/// Default release stage.
pub const DEFAULT_RELEASE_STAGE: &str = "production";
/// Default timeout for the HTTP client the builder creates.
///
/// A shutdown flush takes at most `shutdown_wait` plus this timeout, so the sum
/// has to fit inside the grace period of whatever supervises the process. The
/// defaults come to 35s; shorten both under a 30s supervisor.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default time a shutdown flush waits for an in-flight periodic publish.
pub const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Environment variables read by [`SessionTrackingConfigBuilder::from_env`].
pub mod env {
	pub const API_KEY: &str = "LOOM_SESSIONS_API_KEY";
	pub const ENDPOINT: &str = "LOOM_SESSIONS_ENDPOINT";
	pub const RELEASE_STAGE: &str = "LOOM_SESSIONS_RELEASE_STAGE";
	pub const APP_VERSION: &str = "LOOM_SESSIONS_APP_VERSION";
	pub const AUTO_CAPTURE: &str = "LOOM_SESSIONS_AUTO_CAPTURE";
}

/// Configuration shared by the tracker and the publisher.
///
/// Read-only once the client has started. `publish_interval` may be changed
/// before the tracker is built, which is how tests shorten it.
#[derive(Clone)]
pub struct SessionTrackingConfig {
	/// Full URL sessions are posted to.
	pub endpoint: String,
	api_key: String,
	/// Transport used for every publish. Its timeout bounds the shutdown flush.
	pub http_client: Client,
	/// Whether the startup session is sent automatically.
	pub auto_capture_sessions: bool,
	/// Interval between automatic flushes. Never zero.
	pub publish_interval: Duration,
	/// How long the shutdown flush waits for an in-flight periodic publish
	/// before sending its own batch alongside it.
	pub shutdown_wait: Duration,
	pub release_stage: String,
	/// Application version, reported as an empty string when unknown.
	pub app_version: Option<String>,
	pub hostname: String,
	pub os_name: String,
	/// Explicit process role. When unset the role is detected from the
	/// environment marker.
	pub process_role: Option<ProcessRole>,
	pub logger: Arc<dyn SessionLogger>,
}

impl SessionTrackingConfig {
	/// Creates a new builder for constructing a configuration.
	pub fn builder() -> SessionTrackingConfigBuilder {
		SessionTrackingConfigBuilder::new()
	}

	/// The configured API key.
	pub fn api_key(&self) -> &str {
		&self.api_key
	}

	/// Whether the startup session should be captured.
	pub fn is_auto_capture_sessions(&self) -> bool {
		self.auto_capture_sessions
	}

	/// Logs through the injected logger.
	pub fn logf(&self, args: fmt::Arguments<'_>) {
		self.logger.log(args);
	}

	/// The role of this process, explicit or detected.
	pub fn resolved_role(&self) -> ProcessRole {
		self.process_role.unwrap_or_else(ProcessRole::detect)
	}

	pub(crate) fn notifier(&self) -> NotifierInfo {
		NotifierInfo {
			name: NOTIFIER_NAME.to_string(),
			url: NOTIFIER_URL.to_string(),
			version: SDK_VERSION.to_string(),
		}
	}

	pub(crate) fn app(&self) -> AppInfo {
		AppInfo {
			release_stage: self.release_stage.clone(),
			version: self.app_version.clone().unwrap_or_default(),
		}
	}

	pub(crate) fn device(&self) -> DeviceInfo {
		DeviceInfo {
			os_name: self.os_name.clone(),
			hostname: self.hostname.clone(),
		}
	}
}

impl fmt::Debug for SessionTrackingConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionTrackingConfig")
			.field("endpoint", &self.endpoint)
			.field("api_key", &"[REDACTED]")
			.field("auto_capture_sessions", &self.auto_capture_sessions)
			.field("publish_interval", &self.publish_interval)
			.field("shutdown_wait", &self.shutdown_wait)
			.field("release_stage", &self.release_stage)
			.field("app_version", &self.app_version)
			.field("hostname", &self.hostname)
			.field("os_name", &self.os_name)
			.field("process_role", &self.process_role)
			.finish_non_exhaustive()
	}
}

/// Builder for constructing a [`SessionTrackingConfig`].
pub struct SessionTrackingConfigBuilder {
	api_key: Option<String>,
	endpoint: Option<String>,
	http_client: Option<Client>,
	request_timeout: Duration,
	auto_capture_sessions: bool,
	publish_interval: Duration,
	shutdown_wait: Duration,
	release_stage: Option<String>,
	app_version: Option<String>,
	hostname: Option<String>,
	os_name: Option<String>,
	process_role: Option<ProcessRole>,
	logger: Option<Arc<dyn SessionLogger>>,
}

impl SessionTrackingConfigBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			api_key: None,
			endpoint: None,
			http_client: None,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			auto_capture_sessions: true,
			publish_interval: DEFAULT_PUBLISH_INTERVAL,
			shutdown_wait: DEFAULT_SHUTDOWN_WAIT,
			release_stage: None,
			app_version: None,
			hostname: None,
			os_name: None,
			process_role: None,
			logger: None,
		}
	}

	/// Creates a builder seeded from `LOOM_SESSIONS_*` environment variables.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Creates a builder seeded from an arbitrary key lookup.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
		let mut builder = Self::new();
		if let Some(key) = lookup(env::API_KEY) {
			builder = builder.api_key(key);
		}
		if let Some(endpoint) = lookup(env::ENDPOINT) {
			builder = builder.endpoint(endpoint);
		}
		if let Some(stage) = lookup(env::RELEASE_STAGE) {
			builder = builder.release_stage(stage);
		}
		if let Some(version) = lookup(env::APP_VERSION) {
			builder = builder.app_version(version);
		}
		if let Some(raw) = lookup(env::AUTO_CAPTURE) {
			match parse_bool(&raw) {
				Some(enabled) => builder = builder.auto_capture_sessions(enabled),
				None => warn!(
					variable = env::AUTO_CAPTURE,
					value = %raw,
					"Ignoring unrecognised boolean"
				),
			}
		}
		builder
	}

	/// Sets the API key sent with every publish.
	pub fn api_key(mut self, key: impl Into<String>) -> Self {
		self.api_key = Some(key.into());
		self
	}

	/// Sets the sessions endpoint.
	///
	/// Example: `https://sessions.bugsnag.com`
	pub fn endpoint(mut self, url: impl Into<String>) -> Self {
		self.endpoint = Some(url.into());
		self
	}

	/// Uses a caller-supplied HTTP client as the transport.
	pub fn http_client(mut self, client: Client) -> Self {
		self.http_client = Some(client);
		self
	}

	/// Sets the timeout of the HTTP client the builder creates.
	///
	/// Ignored when a client is supplied with [`Self::http_client`].
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	/// Enables or disables the automatic startup session.
	pub fn auto_capture_sessions(mut self, enabled: bool) -> Self {
		self.auto_capture_sessions = enabled;
		self
	}

	/// Sets the interval between automatic flushes. Must be non-zero.
	pub fn publish_interval(mut self, interval: Duration) -> Self {
		self.publish_interval = interval;
		self
	}

	/// Sets how long a shutdown flush waits for an in-flight periodic publish.
	pub fn shutdown_wait(mut self, wait: Duration) -> Self {
		self.shutdown_wait = wait;
		self
	}

	/// Sets the release stage.
	///
	/// Example: `production`, `staging`, `development`
	pub fn release_stage(mut self, stage: impl Into<String>) -> Self {
		self.release_stage = Some(stage.into());
		self
	}

	/// Sets the application version.
	pub fn app_version(mut self, version: impl Into<String>) -> Self {
		self.app_version = Some(version.into());
		self
	}

	/// Overrides the detected hostname.
	pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
		self.hostname = Some(hostname.into());
		self
	}

	/// Overrides the reported OS name.
	pub fn os_name(mut self, os_name: impl Into<String>) -> Self {
		self.os_name = Some(os_name.into());
		self
	}

	/// Declares the process role instead of detecting it from the environment.
	pub fn process_role(mut self, role: ProcessRole) -> Self {
		self.process_role = Some(role);
		self
	}

	/// Sets the logger publish failures are reported to.
	pub fn logger(mut self, logger: Arc<dyn SessionLogger>) -> Self {
		self.logger = Some(logger);
		self
	}

	/// Builds the configuration.
	pub fn build(self) -> Result<SessionTrackingConfig> {
		let api_key = self
			.api_key
			.filter(|k| !k.trim().is_empty())
			.ok_or(SessionsSdkError::InvalidApiKey)?;

		let endpoint = self
			.endpoint
			.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
		let endpoint = endpoint.trim().trim_end_matches('/').to_string();
		if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
			return Err(SessionsSdkError::InvalidEndpoint(endpoint));
		}

		if self.publish_interval.is_zero() {
			return Err(SessionsSdkError::InvalidPublishInterval);
		}

		let http_client = match self.http_client {
			Some(client) => client,
			None => Client::builder()
				.user_agent(format!("{NOTIFIER_NAME}/{SDK_VERSION}"))
				.timeout(self.request_timeout)
				.build()
				.map_err(SessionsSdkError::RequestFailed)?,
		};

		let hostname = self.hostname.unwrap_or_else(|| {
			hostname::get()
				.map(|h| h.to_string_lossy().to_string())
				.unwrap_or_else(|_| "localhost".to_string())
		});

		Ok(SessionTrackingConfig {
			endpoint,
			api_key,
			http_client,
			auto_capture_sessions: self.auto_capture_sessions,
			publish_interval: self.publish_interval,
			shutdown_wait: self.shutdown_wait,
			release_stage: self
				.release_stage
				.unwrap_or_else(|| DEFAULT_RELEASE_STAGE.to_string()),
			app_version: self.app_version,
			hostname,
			os_name: self
				.os_name
				.unwrap_or_else(|| std::env::consts::OS.to_string()),
			process_role: self.process_role,
			logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
		})
	}
}

impl Default for SessionTrackingConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

fn parse_bool(raw: &str) -> Option<bool> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}
