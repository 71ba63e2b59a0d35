// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod loadavg;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(not(target_os = "linux"))]
pub mod unsupported;

pub use loadavg::{LoadAvg, LoadAvgReader};

/// Returns the load average reader for the platform this binary was built for.
#[must_use]
pub fn platform_reader() -> Box<dyn LoadAvgReader + Send + Sync> {
    #[cfg(target_os = "linux")]
    {
        Box::new(linux::LinuxLoadAvgReader::default())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(unsupported::UnsupportedLoadAvgReader)
    }
}
