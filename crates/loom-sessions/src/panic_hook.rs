// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook that tags panics with the startup session.

use std::panic::PanicHookInfo;

use loom_sessions_core::{format_timestamp, SessionId};
use tracing::error;

use crate::context::SessionContext;

/// A panic tied to the session it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicCorrelation {
	pub session_id: Option<SessionId>,
	/// Session start time, RFC 3339.
	pub session_started_at: Option<String>,
	pub message: String,
	pub location: Option<String>,
}

impl PanicCorrelation {
	/// Correlates a panic with the session in `ctx`.
	///
	/// A task-local context installed with [`SessionContext::scope`] takes
	/// precedence over `ctx`.
	pub fn new(ctx: &SessionContext, message: String, location: Option<String>) -> Self {
		let current = SessionContext::current();
		let session = current
			.as_ref()
			.and_then(SessionContext::session)
			.or_else(|| ctx.session());

		Self {
			session_id: session.map(|s| s.id),
			session_started_at: session.map(|s| format_timestamp(s.started_at)),
			message,
			location,
		}
	}
}

/// Installs a panic hook that logs each panic with its session.
///
/// The previous hook still runs afterwards.
pub fn install_panic_hook(ctx: SessionContext) {
	let default_hook = std::panic::take_hook();

	std::panic::set_hook(Box::new(move |info| {
		let correlation = PanicCorrelation::new(
			&ctx,
			extract_panic_message(info),
			info.location()
				.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
		);

		error!(
			session_id = ?correlation.session_id.map(|id| id.to_string()),
			session_started_at = ?correlation.session_started_at,
			location = ?correlation.location,
			message = %correlation.message,
			"Panic in monitored session"
		);

		default_hook(info);
	}));
}

fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
	if let Some(s) = info.payload().downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = info.payload().downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
