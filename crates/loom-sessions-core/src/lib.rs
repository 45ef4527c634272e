// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom session tracking.
//!
//! This crate holds the pure, I/O-free half of session tracking and is shared
//! by the client SDK (`loom-sessions`) and anything that needs to read the
//! session publish payload:
//!
//! - [`Session`]: a record that one monitored unit of execution started
//! - [`SessionCount`]: a per-minute bucket of session starts, and
//!   [`aggregate`] which folds a batch of sessions into sorted buckets
//! - [`SessionPayload`]: the JSON body posted to the sessions endpoint, plus
//!   the header names in [`headers`]

pub mod aggregate;
pub mod error;
pub mod payload;
pub mod session;

pub use aggregate::{aggregate, bucket_start, format_timestamp, SessionCount};
pub use error::{Result, SessionsError};
pub use payload::{headers, AppInfo, DeviceInfo, NotifierInfo, SessionPayload, PAYLOAD_VERSION};
pub use session::{Session, SessionId};
