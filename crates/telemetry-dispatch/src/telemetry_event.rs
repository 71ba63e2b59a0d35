// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Typed view of the Lambda Telemetry API records the extension turns into metrics.
//!
//! Records arrive as untyped JSON; only three `type`s carry numbers we chart. Everything
//! else decodes to [`TelemetryEvent::Other`] and is dropped after being logged.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::constants::{
    INIT_REPORT_DURATION, REPORT_BILLED_DURATION, REPORT_DURATION, REPORT_INIT_DURATION,
    REPORT_MAX_MEMORY_USED, REPORT_MEMORY_SIZE, RUNTIME_DONE_DURATION,
    RUNTIME_DONE_PRODUCED_BYTES,
};
use crate::errors::RecordError;
use crate::event_queue::RawTelemetryRecord;
use crate::metric::MetricSample;

const MS_PER_SECOND: f64 = 1000.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum TelemetryEvent {
    #[serde(rename = "platform.initReport")]
    InitReport {
        time: DateTime<Utc>,
        record: InitReportRecord,
    },
    #[serde(rename = "platform.report")]
    Report {
        time: DateTime<Utc>,
        record: ReportRecord,
    },
    #[serde(rename = "platform.runtimeDone")]
    RuntimeDone {
        time: DateTime<Utc>,
        record: RuntimeDoneRecord,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReportRecord {
    #[serde(default)]
    pub initialization_type: Option<String>,
    pub metrics: InitReportMetrics,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReportMetrics {
    pub duration_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    #[serde(default)]
    pub request_id: Option<String>,
    pub metrics: ReportMetrics,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub billed_duration_ms: f64,
    pub duration_ms: f64,
    /// Only present on the first invocation of a sandbox
    #[serde(default)]
    pub init_duration_ms: f64,
    #[serde(rename = "maxMemoryUsedMB")]
    pub max_memory_used_mb: f64,
    #[serde(rename = "memorySizeMB")]
    pub memory_size_mb: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDoneRecord {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub metrics: RuntimeDoneMetrics,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeDoneMetrics {
    pub duration_ms: f64,
    #[serde(default)]
    pub produced_bytes: f64,
}

impl TelemetryEvent {
    /// Decodes one raw record.
    ///
    /// Unknown `type`s are not an error, they decode to [`TelemetryEvent::Other`]. A record
    /// with a known `type` whose payload does not match the expected shape is.
    pub fn from_record(record: &RawTelemetryRecord) -> Result<Self, RecordError> {
        let record_type = record
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(RecordError::MissingType)?;

        TelemetryEvent::deserialize(record).map_err(|source| RecordError::Shape {
            record_type: record_type.to_string(),
            source,
        })
    }

    /// Metric samples carried by this event, timestamped at event time.
    #[must_use]
    pub fn samples(&self) -> Vec<MetricSample> {
        match self {
            TelemetryEvent::InitReport { time, record } => {
                let time = time.timestamp();
                vec![MetricSample::new(
                    INIT_REPORT_DURATION,
                    time,
                    record.metrics.duration_ms / MS_PER_SECOND,
                )]
            }
            TelemetryEvent::Report { time, record } => {
                let time = time.timestamp();
                let metrics = &record.metrics;
                vec![
                    MetricSample::new(
                        REPORT_BILLED_DURATION,
                        time,
                        metrics.billed_duration_ms / MS_PER_SECOND,
                    ),
                    MetricSample::new(REPORT_DURATION, time, metrics.duration_ms / MS_PER_SECOND),
                    MetricSample::new(
                        REPORT_INIT_DURATION,
                        time,
                        metrics.init_duration_ms / MS_PER_SECOND,
                    ),
                    MetricSample::new(
                        REPORT_MAX_MEMORY_USED,
                        time,
                        metrics.max_memory_used_mb * BYTES_PER_MB,
                    ),
                    MetricSample::new(
                        REPORT_MEMORY_SIZE,
                        time,
                        metrics.memory_size_mb * BYTES_PER_MB,
                    ),
                ]
            }
            TelemetryEvent::RuntimeDone { time, record } => {
                let time = time.timestamp();
                vec![
                    MetricSample::new(
                        RUNTIME_DONE_DURATION,
                        time,
                        record.metrics.duration_ms / MS_PER_SECOND,
                    ),
                    MetricSample::new(
                        RUNTIME_DONE_PRODUCED_BYTES,
                        time,
                        record.metrics.produced_bytes,
                    ),
                ]
            }
            TelemetryEvent::Other => Vec::new(),
        }
    }
}
