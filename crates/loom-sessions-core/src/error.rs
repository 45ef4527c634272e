// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions core types.

use thiserror::Error;

/// Result type alias for sessions core operations.
pub type Result<T> = std::result::Result<T, SessionsError>;

/// Errors that can occur in the sessions core types.
#[derive(Debug, Error)]
pub enum SessionsError {
	/// Invalid session ID
	#[error("invalid session ID: {0}")]
	InvalidSessionId(String),

	/// Invalid timestamp in a session count
	#[error("invalid timestamp: {0}")]
	InvalidTimestamp(String),
}
