// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-minute session count buckets.
//!
//! A publish never sends individual sessions. Sessions are folded into buckets
//! keyed by their start time truncated to the minute, and each bucket carries
//! only the number of sessions that started in it.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Number of sessions that started within one minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCount {
	/// Minute the bucket covers (e.g., "2026-01-18T12:34:00Z")
	#[serde(with = "rfc3339_seconds")]
	pub started_at: DateTime<Utc>,
	/// Sessions started within the minute
	pub sessions_started: u64,
}

/// Truncates an instant to the start of its minute.
#[must_use]
pub fn bucket_start(instant: DateTime<Utc>) -> DateTime<Utc> {
	instant
		.with_nanosecond(0)
		.and_then(|t| t.with_second(0))
		.unwrap_or(instant)
}

/// Formats an instant as RFC 3339 with whole seconds and a `Z` suffix.
///
/// The result is always 20 characters long, e.g. `2026-01-18T12:34:56Z`.
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
	instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Folds sessions into buckets sorted ascending by bucket start.
///
/// The sum of `sessions_started` over the result always equals
/// `sessions.len()`.
#[must_use]
pub fn aggregate(sessions: &[Session]) -> Vec<SessionCount> {
	let mut buckets: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
	for session in sessions {
		*buckets.entry(bucket_start(session.started_at)).or_default() += 1;
	}

	buckets
		.into_iter()
		.map(|(started_at, sessions_started)| SessionCount {
			started_at,
			sessions_started,
		})
		.collect()
}

mod rfc3339_seconds {
	use chrono::{DateTime, Utc};
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&super::format_timestamp(*value))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
		let raw = String::deserialize(deserializer)?;
		DateTime::parse_from_rfc3339(&raw)
			.map(|t| t.with_timezone(&Utc))
			.map_err(|_| {
				serde::de::Error::custom(crate::error::SessionsError::InvalidTimestamp(raw.clone()))
			})
	}
}
