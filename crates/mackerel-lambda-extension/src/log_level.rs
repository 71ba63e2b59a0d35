// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log level of the extension, read from `EXT_LOG_LEVEL`.
//!
//! Accepted values, case-insensitive: `TRACE`, `DEBUG`, `INFO`, `WARN` (or `WARNING`),
//! `ERROR`, and `FATAL`/`PANIC` which both mean `ERROR`. Anything else falls back to `WARN`.

use std::env;
use std::str::FromStr;

pub const LOG_LEVEL_ENV: &str = "EXT_LOG_LEVEL";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl AsRef<str> for LogLevel {
    fn as_ref(&self) -> &str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl LogLevel {
    /// Directive for a `tracing_subscriber::EnvFilter`
    #[must_use]
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Reads `EXT_LOG_LEVEL`. Never fails: logging is not set up yet when this runs, so an
    /// unknown value silently becomes the default.
    #[must_use]
    pub fn from_env() -> Self {
        env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" | "fatal" | "panic" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Invalid log level: '{s}'. Valid levels are: trace, debug, info, warning, error, fatal, panic",
            )),
        }
    }
}
