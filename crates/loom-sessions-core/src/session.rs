// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session types for app session tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionsError;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|_| SessionsError::InvalidSessionId(s.to_string()))
	}
}

/// A record that one monitored unit of application execution began.
///
/// Sessions are immutable once created. They live in the tracker's pending
/// buffer until they are included in a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
	pub id: SessionId,
	pub started_at: DateTime<Utc>,
}

impl Session {
	/// Creates a session with a fresh ID, started now.
	#[must_use]
	pub fn new() -> Self {
		Self {
			id: SessionId::new(),
			started_at: Utc::now(),
		}
	}

	/// Creates a session with a known ID and start time.
	#[must_use]
	pub fn with_started_at(id: SessionId, started_at: DateTime<Utc>) -> Self {
		Self { id, started_at }
	}
}

impl Default for Session {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::collections::HashSet;

	proptest! {
		#[test]
		fn session_id_roundtrip(uuid_bytes in any::<[u8; 16]>()) {
			let uuid = Uuid::from_bytes(uuid_bytes);
			let id = SessionId(uuid);
			let s = id.to_string();
			let parsed: SessionId = s.parse().unwrap();
			prop_assert_eq!(id, parsed);
		}
	}

	#[test]
	fn test_session_id_parse_rejects_garbage() {
		let err = "not-a-session".parse::<SessionId>().unwrap_err();
		assert!(matches!(err, SessionsError::InvalidSessionId(ref s) if s == "not-a-session"));
	}

	#[test]
	fn test_new_sessions_have_unique_ids() {
		let ids: HashSet<SessionId> = (0..1000).map(|_| Session::new().id).collect();
		assert_eq!(ids.len(), 1000);
	}

	#[test]
	fn test_new_session_starts_now() {
		let before = Utc::now();
		let session = Session::new();
		let after = Utc::now();

		assert!(session.started_at >= before);
		assert!(session.started_at <= after);
	}
}
