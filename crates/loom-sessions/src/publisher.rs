// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serializes session batches and sends them to the collector.

use std::sync::Arc;

use chrono::Utc;
use loom_sessions_core::{format_timestamp, headers, Session, SessionPayload, PAYLOAD_VERSION};
use tracing::debug;

use crate::config::SessionTrackingConfig;
use crate::error::{Result, SessionsSdkError};

/// Sends one batch of sessions.
///
/// Implementations must not retry or persist: a failed batch is reported to
/// the caller and then dropped.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
	/// Publishes a batch of sessions.
	async fn publish(&self, sessions: Vec<Session>) -> Result<()>;
}

/// Posts session counts to the configured endpoint over HTTP.
pub struct HttpPublisher {
	config: Arc<SessionTrackingConfig>,
}

impl HttpPublisher {
	/// Creates a publisher using the configured transport.
	pub fn new(config: Arc<SessionTrackingConfig>) -> Self {
		Self { config }
	}

	/// Builds the request body for a batch.
	pub fn payload(&self, sessions: &[Session]) -> SessionPayload {
		SessionPayload::new(
			self.config.notifier(),
			self.config.app(),
			self.config.device(),
			sessions,
		)
	}
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
	async fn publish(&self, sessions: Vec<Session>) -> Result<()> {
		if sessions.is_empty() {
			return Ok(());
		}

		let body = serde_json::to_vec(&self.payload(&sessions))?;

		debug!(
			endpoint = %self.config.endpoint,
			sessions = sessions.len(),
			"Publishing sessions"
		);

		let response = self
			.config
			.http_client
			.post(&self.config.endpoint)
			.header(headers::CONTENT_TYPE, headers::JSON)
			.header(headers::PAYLOAD_VERSION, PAYLOAD_VERSION)
			.header(headers::API_KEY, self.config.api_key())
			.header(headers::SENT_AT, format_timestamp(Utc::now()))
			.body(body)
			.send()
			.await?;

		if !response.status().is_success() {
			let status = response.status().as_u16();
			let message = response.text().await.unwrap_or_default();
			return Err(SessionsSdkError::ServerError { status, message });
		}

		debug!(sessions = sessions.len(), "Sessions published");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_sessions_core::SessionId;
	use wiremock::matchers::{header, method};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config_for(server: &MockServer) -> Arc<SessionTrackingConfig> {
		Arc::new(
			SessionTrackingConfig::builder()
				.api_key("test-api-key")
				.endpoint(server.uri())
				.release_stage("staging")
				.app_version("2.0.0")
				.hostname("web-01")
				.build()
				.unwrap(),
		)
	}

	#[tokio::test]
	async fn test_publish_sends_headers_and_counts() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(header("Bugsnag-Api-Key", "test-api-key"))
			.and(header("Bugsnag-Payload-Version", "1.0"))
			.and(header("Content-Type", "application/json"))
			.respond_with(ResponseTemplate::new(202))
			.expect(1)
			.mount(&server)
			.await;

		let publisher = HttpPublisher::new(config_for(&server));
		let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
		let sessions: Vec<Session> = (0..3)
			.map(|_| Session::with_started_at(SessionId::new(), an_hour_ago))
			.collect();
		publisher.publish(sessions).await.unwrap();

		let requests = server.received_requests().await.unwrap();
		let sent_at = requests[0]
			.headers
			.get("Bugsnag-Sent-At")
			.unwrap()
			.to_str()
			.unwrap();
		assert_eq!(sent_at.len(), 20);

		// Sent-At is the send time, not the start of the sessions.
		let sent_at = chrono::DateTime::parse_from_rfc3339(sent_at)
			.unwrap()
			.with_timezone(&Utc);
		assert!((Utc::now() - sent_at).num_seconds().abs() <= 5);

		let payload: SessionPayload = serde_json::from_slice(&requests[0].body).unwrap();
		assert_eq!(payload.total_sessions(), 3);
		assert_eq!(
			payload.session_counts[0].started_at,
			loom_sessions_core::bucket_start(an_hour_ago)
		);
		assert_eq!(payload.app.release_stage, "staging");
		assert_eq!(payload.app.version, "2.0.0");
		assert_eq!(payload.device.hostname, "web-01");
		assert_eq!(payload.notifier.name, "loom-sessions-rust");
	}

	#[tokio::test]
	async fn test_publish_non_success_is_error() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
			.mount(&server)
			.await;

		let publisher = HttpPublisher::new(config_for(&server));
		let result = publisher.publish(vec![Session::new()]).await;

		match result {
			Err(SessionsSdkError::ServerError { status, message }) => {
				assert_eq!(status, 400);
				assert_eq!(message, "bad payload");
			}
			other => panic!("expected server error, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn test_publish_empty_batch_sends_nothing() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(202))
			.expect(0)
			.mount(&server)
			.await;

		let publisher = HttpPublisher::new(config_for(&server));
		publisher.publish(Vec::new()).await.unwrap();
	}

	#[tokio::test]
	async fn test_publish_transport_failure_is_error() {
		let config = Arc::new(
			SessionTrackingConfig::builder()
				.api_key("key")
				.endpoint("http://127.0.0.1:1")
				.build()
				.unwrap(),
		);

		let result = HttpPublisher::new(config)
			.publish(vec![Session::new()])
			.await;
		assert!(matches!(result, Err(SessionsSdkError::RequestFailed(_))));
	}
}
