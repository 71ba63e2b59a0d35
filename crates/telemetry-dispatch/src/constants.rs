// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Cold start duration, one sample per sandbox. Shipped as-is, never aggregated.
pub const INIT_REPORT_DURATION: &str = "custom.lambda.platform.initReport.duration.duration";

pub const REPORT_BILLED_DURATION: &str = "custom.lambda.platform.report.billedDuration";
pub const REPORT_DURATION: &str = "custom.lambda.platform.report.duration";
pub const REPORT_INIT_DURATION: &str = "custom.lambda.platform.report.initDuration";
pub const REPORT_MAX_MEMORY_USED: &str = "custom.lambda.platform.report.maxMemoryUsed";
pub const REPORT_MEMORY_SIZE: &str = "custom.lambda.platform.report.memorySize";

pub const RUNTIME_DONE_DURATION: &str = "custom.lambda.platform.runtimeDone.duration";
pub const RUNTIME_DONE_PRODUCED_BYTES: &str = "custom.lambda.platform.runtimeDone.producedBytes";

pub const LOADAVG_1: &str = "custom.lambda.osstat.loadavg.loadavg1";
pub const LOADAVG_5: &str = "custom.lambda.osstat.loadavg.loadavg5";
pub const LOADAVG_15: &str = "custom.lambda.osstat.loadavg.loadavg15";

pub const AGGREGATION_SUFFIXES: [&str; 3] = ["avg", "max", "min"];

/// Default port of the telemetry listener inside the sandbox
pub const DEFAULT_LISTENER_PORT: u16 = 4323;
