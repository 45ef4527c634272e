// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flush-on-termination signal handling.
//!
//! The coordinator waits for SIGTERM or SIGINT, stops intercepting them, runs
//! the tracker's shutdown flush, and then re-delivers the same signal with its
//! default disposition. The process therefore dies exactly as it would have
//! without the SDK: same exit status, same core dump behaviour, same view for
//! process supervisors.
//!
//! Signal access is a capability chosen when the client is composed:
//!
//! - [`UnixSignals`]: full interception and re-delivery (unix)
//! - [`CtrlCSignals`]: Ctrl-C only, re-delivery replaced by `exit(128 + 2)`
//!   (platforms without POSIX signals)
//! - [`NoopSignals`]: never intercepts anything. For sandboxed runtimes that
//!   forbid signal handlers or signalling the own process. Sessions buffered
//!   since the last periodic flush are lost when such a process terminates.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::Result;
use crate::tracker::SessionTracker;

/// A termination signal the coordinator handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
	/// SIGTERM
	Terminate,
	/// SIGINT
	Interrupt,
}

impl TerminationSignal {
	/// Conventional signal number.
	pub fn number(self) -> i32 {
		match self {
			TerminationSignal::Terminate => 15,
			TerminationSignal::Interrupt => 2,
		}
	}

	/// Exit code a shell reports for a process killed by this signal.
	pub fn exit_code(self) -> i32 {
		128 + self.number()
	}

	pub fn name(self) -> &'static str {
		match self {
			TerminationSignal::Terminate => "SIGTERM",
			TerminationSignal::Interrupt => "SIGINT",
		}
	}

	#[cfg(unix)]
	fn as_nix(self) -> nix::sys::signal::Signal {
		match self {
			TerminationSignal::Terminate => nix::sys::signal::Signal::SIGTERM,
			TerminationSignal::Interrupt => nix::sys::signal::Signal::SIGINT,
		}
	}
}

impl std::fmt::Display for TerminationSignal {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Access to process termination signals.
#[async_trait::async_trait]
pub trait SignalCapability: Send {
	/// Waits for the next termination signal.
	///
	/// `None` means no signal will ever be delivered through this capability.
	async fn next(&mut self) -> Option<TerminationSignal>;

	/// Stops intercepting termination signals.
	fn deregister(&mut self);

	/// Delivers `signal` to the current process with its default disposition.
	///
	/// On success this does not return.
	fn redeliver(&mut self, signal: TerminationSignal);
}

/// SIGTERM and SIGINT via tokio, re-delivered with `raise(3)`.
#[cfg(unix)]
pub struct UnixSignals {
	terminate: Option<tokio::signal::unix::Signal>,
	interrupt: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl UnixSignals {
	/// Starts intercepting SIGTERM and SIGINT. Must run inside a tokio runtime.
	pub fn new() -> Result<Self> {
		use tokio::signal::unix::{signal, SignalKind};

		use crate::error::SessionsSdkError;

		let terminate =
			signal(SignalKind::terminate()).map_err(SessionsSdkError::SignalRegistration)?;
		let interrupt =
			signal(SignalKind::interrupt()).map_err(SessionsSdkError::SignalRegistration)?;

		Ok(Self {
			terminate: Some(terminate),
			interrupt: Some(interrupt),
		})
	}
}

#[cfg(unix)]
#[async_trait::async_trait]
impl SignalCapability for UnixSignals {
	async fn next(&mut self) -> Option<TerminationSignal> {
		let (Some(terminate), Some(interrupt)) = (self.terminate.as_mut(), self.interrupt.as_mut())
		else {
			return None;
		};

		tokio::select! {
			Some(()) = terminate.recv() => Some(TerminationSignal::Terminate),
			Some(()) = interrupt.recv() => Some(TerminationSignal::Interrupt),
			else => None,
		}
	}

	fn deregister(&mut self) {
		use nix::sys::signal::{signal, SigHandler};

		self.terminate = None;
		self.interrupt = None;

		// Dropping the tokio listeners leaves tokio's process-wide handler in
		// place, so the disposition has to be reset explicitly.
		for sig in [TerminationSignal::Terminate, TerminationSignal::Interrupt] {
			// SAFETY: installing SIG_DFL does not run any code in signal context.
			if let Err(e) = unsafe { signal(sig.as_nix(), SigHandler::SigDfl) } {
				tracing::warn!(signal = sig.name(), error = %e, "Failed to restore default signal disposition");
			}
		}
	}

	fn redeliver(&mut self, signal: TerminationSignal) {
		// raise(3) targets the calling thread, so a default-disposition signal
		// is acted on before the call returns.
		if let Err(e) = nix::sys::signal::raise(signal.as_nix()) {
			tracing::warn!(signal = signal.name(), error = %e, "Failed to re-raise signal");
		}
		std::process::exit(signal.exit_code());
	}
}

/// Ctrl-C via tokio. Used where POSIX signals are unavailable.
#[cfg(not(unix))]
pub struct CtrlCSignals {
	listening: bool,
}

#[cfg(not(unix))]
impl CtrlCSignals {
	pub fn new() -> Result<Self> {
		Ok(Self { listening: true })
	}
}

#[cfg(not(unix))]
#[async_trait::async_trait]
impl SignalCapability for CtrlCSignals {
	async fn next(&mut self) -> Option<TerminationSignal> {
		if !self.listening {
			return None;
		}
		tokio::signal::ctrl_c()
			.await
			.ok()
			.map(|()| TerminationSignal::Interrupt)
	}

	fn deregister(&mut self) {
		self.listening = false;
	}

	fn redeliver(&mut self, signal: TerminationSignal) {
		std::process::exit(signal.exit_code());
	}
}

/// Never intercepts anything.
///
/// For sandboxed runtimes that forbid signal handlers or signalling the own
/// process. Sessions not yet published by the periodic flush are lost on
/// shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSignals;

#[async_trait::async_trait]
impl SignalCapability for NoopSignals {
	async fn next(&mut self) -> Option<TerminationSignal> {
		None
	}

	fn deregister(&mut self) {}

	fn redeliver(&mut self, _signal: TerminationSignal) {}
}

/// The signal capability for the current platform.
pub fn platform_signals() -> Result<Box<dyn SignalCapability>> {
	#[cfg(unix)]
	{
		Ok(Box::new(UnixSignals::new()?))
	}
	#[cfg(not(unix))]
	{
		Ok(Box::new(CtrlCSignals::new()?))
	}
}

/// Lifecycle of a [`SignalCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoordinatorState {
	/// Waiting for a termination signal.
	Listening = 0,
	/// Signal received, shutdown flush in progress.
	Flushing = 1,
	/// Flush done, signal re-delivered.
	Terminated = 2,
}

impl CoordinatorState {
	fn from_u8(value: u8) -> Self {
		match value {
			0 => CoordinatorState::Listening,
			1 => CoordinatorState::Flushing,
			_ => CoordinatorState::Terminated,
		}
	}
}

/// Read-only view of a coordinator's state.
#[derive(Debug, Clone)]
pub struct CoordinatorStateHandle(Arc<AtomicU8>);

impl CoordinatorStateHandle {
	pub fn get(&self) -> CoordinatorState {
		CoordinatorState::from_u8(self.0.load(Ordering::SeqCst))
	}
}

/// Bridges termination signals to a synchronous shutdown flush.
pub struct SignalCoordinator {
	tracker: Arc<SessionTracker>,
	signals: Box<dyn SignalCapability>,
	state: Arc<AtomicU8>,
}

impl SignalCoordinator {
	pub fn new(tracker: Arc<SessionTracker>, signals: Box<dyn SignalCapability>) -> Self {
		Self {
			tracker,
			signals,
			state: Arc::new(AtomicU8::new(CoordinatorState::Listening as u8)),
		}
	}

	pub fn state(&self) -> CoordinatorStateHandle {
		CoordinatorStateHandle(Arc::clone(&self.state))
	}

	/// Waits for one termination signal, flushes, and re-delivers it.
	///
	/// Returns the handled signal when re-delivery returned control (only
	/// capabilities that cannot terminate the process do that), or `None` when
	/// the capability never delivers signals.
	pub async fn run(mut self) -> Option<TerminationSignal> {
		let Some(signal) = self.signals.next().await else {
			debug!("Signal interception unavailable, shutdown flush disabled");
			return None;
		};

		info!(signal = signal.name(), "Termination signal received, flushing sessions");
		self.set_state(CoordinatorState::Flushing);
		self.signals.deregister();
		self.tracker.flush_and_stop().await;

		self.set_state(CoordinatorState::Terminated);
		info!(signal = signal.name(), "Re-delivering termination signal");
		self.signals.redeliver(signal);
		Some(signal)
	}

	/// Spawns [`Self::run`] on the current tokio runtime.
	pub fn spawn(self) -> JoinHandle<Option<TerminationSignal>> {
		tokio::spawn(self.run())
	}

	fn set_state(&self, state: CoordinatorState) {
		self.state.store(state as u8, Ordering::SeqCst);
	}
}
