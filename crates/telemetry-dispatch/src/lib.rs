// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Telemetry Dispatch
//!
//! Receives record batches pushed by the Lambda Telemetry API, keeps them in an
//! in-memory queue, and periodically turns them into aggregated platform metrics
//! posted to Mackerel.
//!
//! - [`listener`]: HTTP endpoint the Telemetry API delivers to
//! - [`event_queue`]: thread-safe FIFO between the listener and the dispatcher
//! - [`dispatcher`]: paced drain, classify, aggregate and post cycle
//! - [`mackerel`]: backend client and the host identity metrics are posted under

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod constants;
pub mod dispatcher;
pub mod errors;
pub mod event_queue;
pub mod graph_defs;
pub mod http_utils;
pub mod listener;
pub mod mackerel;
pub mod metric;
pub mod sink;
pub mod telemetry_event;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use event_queue::EventQueue;
pub use listener::{TelemetryListener, TelemetryListenerConfig};
pub use sink::MetricsSink;
