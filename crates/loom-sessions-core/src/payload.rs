// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The session publish payload.
//!
//! Wire format (JSON, camelCase keys):
//!
//! ```json
//! {
//!   "notifier": { "name": "...", "url": "...", "version": "..." },
//!   "app": { "releaseStage": "production", "version": "" },
//!   "device": { "osName": "linux", "hostname": "web-01" },
//!   "sessionCounts": [ { "startedAt": "2026-01-18T12:34:00Z", "sessionsStarted": 3 } ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::aggregate::{aggregate, SessionCount};
use crate::session::Session;

/// Value of the payload version header.
pub const PAYLOAD_VERSION: &str = "1.0";

/// HTTP header names used when publishing sessions.
pub mod headers {
	pub const CONTENT_TYPE: &str = "Content-Type";
	pub const PAYLOAD_VERSION: &str = "Bugsnag-Payload-Version";
	pub const API_KEY: &str = "Bugsnag-Api-Key";
	pub const SENT_AT: &str = "Bugsnag-Sent-At";
	pub const JSON: &str = "application/json";
}

/// Identifies the library that produced the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierInfo {
	pub name: String,
	pub url: String,
	pub version: String,
}

/// Application metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
	/// Release stage (production, staging, etc.)
	pub release_stage: String,
	/// Application version, empty when unknown
	#[serde(default)]
	pub version: String,
}

/// Host metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
	pub os_name: String,
	pub hostname: String,
}

/// Body of one session publish request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
	pub notifier: NotifierInfo,
	pub app: AppInfo,
	pub device: DeviceInfo,
	/// Buckets sorted ascending by start time
	pub session_counts: Vec<SessionCount>,
}

impl SessionPayload {
	/// Builds a payload for a batch of sessions.
	#[must_use]
	pub fn new(
		notifier: NotifierInfo,
		app: AppInfo,
		device: DeviceInfo,
		sessions: &[Session],
	) -> Self {
		Self {
			notifier,
			app,
			device,
			session_counts: aggregate(sessions),
		}
	}

	/// Total sessions across all buckets.
	#[must_use]
	pub fn total_sessions(&self) -> u64 {
		self.session_counts.iter().map(|c| c.sessions_started).sum()
	}
}
