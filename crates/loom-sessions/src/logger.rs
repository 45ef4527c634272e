// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging capability injected through the configuration.
//!
//! Publish failures are never returned into application code. They are
//! reported here, and the default implementation forwards them to `tracing`.

use std::fmt;

/// Sink for the SDK's operational messages (publish failures and the like).
pub trait SessionLogger: Send + Sync {
	/// Logs one formatted message.
	fn log(&self, args: fmt::Arguments<'_>);
}

/// Forwards messages to `tracing` at warn level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SessionLogger for TracingLogger {
	fn log(&self, args: fmt::Arguments<'_>) {
		tracing::warn!(target: "loom_sessions", "{}", args);
	}
}
