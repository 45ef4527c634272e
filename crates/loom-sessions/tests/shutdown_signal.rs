// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Termination signals flush pending sessions and still kill the process.
//!
//! The parent test re-executes this test binary, running only
//! [`signal_child`], which starts a client, buffers a few sessions and waits
//! to be signalled.

#![cfg(unix)]

use std::io::{BufRead, BufReader, Write};
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use loom_sessions::{SessionClient, SessionContext, SessionTrackingConfig};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use wiremock::matchers::{header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHILD_ENDPOINT_ENV: &str = "LOOM_SESSIONS_SIGNAL_TEST_ENDPOINT";
const CHILD_READY: &str = "loom-sessions-child-ready";
const CHILD_SESSIONS: u64 = 3;
const TEST_API_KEY: &str = "166f5ad3590596f9aa8d601ea89af845";

/// Runs only when re-executed by one of the tests below.
#[test]
fn signal_child() {
	let Ok(endpoint) = std::env::var(CHILD_ENDPOINT_ENV) else {
		return;
	};

	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.unwrap();

	runtime.block_on(async move {
		let config = SessionTrackingConfig::builder()
			.api_key(TEST_API_KEY)
			.endpoint(endpoint)
			.publish_interval(Duration::from_secs(3600))
			.auto_capture_sessions(false)
			.build()
			.unwrap();
		let client = SessionClient::start(config).unwrap();

		for _ in 0..CHILD_SESSIONS {
			client.start_session(&SessionContext::background());
		}

		println!("{CHILD_READY}");
		std::io::stdout().flush().unwrap();

		tokio::time::sleep(Duration::from_secs(30)).await;
	});

	panic!("child was not terminated by the signal");
}

fn run_signalled_child(endpoint: String, signal: Signal) -> ExitStatus {
	let mut child = Command::new(std::env::current_exe().unwrap())
		.args(["signal_child", "--exact", "--nocapture", "--test-threads=1"])
		.env(CHILD_ENDPOINT_ENV, endpoint)
		.stdout(Stdio::piped())
		.stderr(Stdio::null())
		.spawn()
		.unwrap();

	let stdout = child.stdout.take().unwrap();
	let mut lines = BufReader::new(stdout).lines();
	loop {
		match lines.next() {
			Some(Ok(line)) if line.contains(CHILD_READY) => break,
			Some(_) => continue,
			None => panic!("child exited before it was ready"),
		}
	}

	kill(Pid::from_raw(child.id() as i32), signal).unwrap();

	// Keep draining so the child never blocks on a full pipe.
	for _ in lines {}

	child.wait().unwrap()
}

async fn assert_flushed_then_killed_by(signal: Signal) {
	let server = MockServer::start().await;
	Mock::given(method("POST"))
		.and(header("Bugsnag-Api-Key", TEST_API_KEY))
		.respond_with(ResponseTemplate::new(202))
		.expect(1)
		.mount(&server)
		.await;

	let endpoint = server.uri();
	let status = tokio::task::spawn_blocking(move || run_signalled_child(endpoint, signal))
		.await
		.unwrap();

	assert_eq!(status.signal(), Some(signal as i32), "status was {status:?}");
	assert_eq!(status.code(), None);

	let requests = server.received_requests().await.unwrap();
	assert_eq!(requests.len(), 1);

	let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
	let published: u64 = body["sessionCounts"]
		.as_array()
		.unwrap()
		.iter()
		.map(|c| c["sessionsStarted"].as_u64().unwrap())
		.sum();
	assert_eq!(published, CHILD_SESSIONS);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sigterm_flushes_then_terminates() {
	assert_flushed_then_killed_by(Signal::SIGTERM).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sigint_flushes_then_terminates() {
	assert_flushed_then_killed_by(Signal::SIGINT).await;
}
