// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Load average collector
//!
//! Load averages are sampled once per dispatch cycle and attached to the metric batch
//! sent to the backend. A failed read (missing `/proc`, unsupported platform) must not
//! stop the caller from shipping the rest of its batch.

use std::io;

/// 1, 5 and 15 minute system load averages
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

pub trait LoadAvgReader {
    fn read(&self) -> io::Result<LoadAvg>;
}

/// Parses the first three fields of a `/proc/loadavg` style line.
///
/// The file looks like `0.20 0.18 0.12 1/80 11206`; only the first three columns are
/// load averages, the remaining ones (runnable/total tasks, last pid) are ignored.
pub fn parse_loadavg(contents: &str) -> io::Result<LoadAvg> {
    let mut fields = contents.split_whitespace();
    let mut next_value = |label: &str| -> io::Result<f64> {
        let raw = fields.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("missing {label} load average in {contents:?}"),
            )
        })?;
        raw.parse::<f64>().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("failed to parse {label} load average {raw:?}: {e}"),
            )
        })
    };

    let one = next_value("1m")?;
    let five = next_value("5m")?;
    let fifteen = next_value("15m")?;

    Ok(LoadAvg { one, five, fifteen })
}
