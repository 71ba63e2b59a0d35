// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::loadavg::{parse_loadavg, LoadAvg, LoadAvgReader};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::debug;

const PROC_LOADAVG_PATH: &str = "/proc/loadavg";

pub struct LinuxLoadAvgReader {
    path: PathBuf,
}

impl Default for LinuxLoadAvgReader {
    fn default() -> Self {
        Self {
            path: PathBuf::from(PROC_LOADAVG_PATH),
        }
    }
}

impl LinuxLoadAvgReader {
    /// Reads from an arbitrary file instead of `/proc/loadavg`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LoadAvgReader for LinuxLoadAvgReader {
    fn read(&self) -> io::Result<LoadAvg> {
        let contents = fs::read_to_string(&self.path)?;
        debug!("Contents of {}: {}", self.path.display(), contents.trim());
        parse_loadavg(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.42 0.30 0.25 2/310 9876").unwrap();

        let reader = LinuxLoadAvgReader::with_path(file.path());
        let load = reader.read().unwrap();
        assert_eq!(load.one, 0.42);
        assert_eq!(load.five, 0.30);
        assert_eq!(load.fifteen, 0.25);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let reader = LinuxLoadAvgReader::with_path(dir.path().join("loadavg"));
        let err = reader.read().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_read_proc_loadavg() {
        let load = LinuxLoadAvgReader::default().read().unwrap();
        assert!(load.one >= 0.0);
        assert!(load.fifteen >= 0.0);
    }
}
