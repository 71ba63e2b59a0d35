// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::loadavg::{LoadAvg, LoadAvgReader};
use std::io;
use tracing::debug;

pub struct UnsupportedLoadAvgReader;

impl LoadAvgReader for UnsupportedLoadAvgReader {
    fn read(&self) -> io::Result<LoadAvg> {
        debug!("Load average is not available on this platform");
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "load average is only collected on Linux",
        ))
    }
}
