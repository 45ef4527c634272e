// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions SDK.

use thiserror::Error;

/// Result type alias for sessions SDK operations.
pub type Result<T> = std::result::Result<T, SessionsSdkError>;

/// Errors that can occur in the sessions SDK.
#[derive(Debug, Error)]
pub enum SessionsSdkError {
	/// API key is missing or empty.
	#[error("API key is required")]
	InvalidApiKey,

	/// Sessions endpoint is missing or not an http(s) URL.
	#[error("invalid sessions endpoint: {0}")]
	InvalidEndpoint(String),

	/// Publish interval is zero.
	#[error("publish interval must be greater than zero")]
	InvalidPublishInterval,

	/// HTTP request failed.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Collector returned a non-success status.
	#[error("server error (status {status}): {message}")]
	ServerError {
		/// HTTP status code.
		status: u16,
		/// Response body, if any.
		message: String,
	},

	/// Failed to serialize the payload.
	#[error("serialization error: {0}")]
	SerializationError(#[from] serde_json::Error),

	/// No session is attached to the execution context.
	#[error("no session attached to the execution context")]
	MissingContext,

	/// Installing the termination signal listeners failed.
	#[error("failed to register signal handler: {0}")]
	SignalRegistration(#[source] std::io::Error),

	/// The operation needs a tokio runtime but none is running.
	#[error("no tokio runtime is running")]
	NoRuntime,
}
