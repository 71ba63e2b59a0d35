// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Mackerel Lambda Extension
//!
//! An AWS Lambda extension that subscribes to the Telemetry API of its function and
//! reports platform metrics (init, invoke and runtime durations, memory, produced bytes,
//! load average) to a Mackerel host representing the execution environment.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod error;
pub mod extension_api;
pub mod lifecycle;
pub mod log_level;
pub mod logger;
pub mod secrets;
pub mod services;
pub mod telemetry_api;
