// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Execution context carrying the active session.
//!
//! A [`SessionContext`] is handed back by every session start so callers can
//! pass it to whatever reports crashes for that unit of work. It can also be
//! installed as the task-local context of a future with
//! [`SessionContext::scope`], after which [`SessionContext::current`] finds it
//! from anywhere inside that future.

use std::future::Future;

use loom_sessions_core::Session;

use crate::error::{Result, SessionsSdkError};

tokio::task_local! {
	static CURRENT: SessionContext;
}

/// Execution context, optionally carrying a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
	session: Option<Session>,
}

impl SessionContext {
	/// A context with no session attached.
	#[must_use]
	pub fn background() -> Self {
		Self::default()
	}

	/// Derives a context carrying `session`.
	#[must_use]
	pub fn with_session(&self, session: Session) -> Self {
		Self {
			session: Some(session),
		}
	}

	/// The attached session, if any.
	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	/// The attached session, or [`SessionsSdkError::MissingContext`].
	pub fn require_session(&self) -> Result<&Session> {
		self.session.as_ref().ok_or(SessionsSdkError::MissingContext)
	}

	/// Runs `fut` with this context installed as the task-local context.
	pub async fn scope<F: Future>(self, fut: F) -> F::Output {
		CURRENT.scope(self, fut).await
	}

	/// The context installed by the nearest enclosing [`Self::scope`].
	pub fn current() -> Option<SessionContext> {
		CURRENT.try_with(Clone::clone).ok()
	}
}
