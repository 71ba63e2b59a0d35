// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use host_metrics_collector::{LoadAvg, LoadAvgReader};
use serde_json::{json, Value};

/// Load average reader returning fixed values
pub struct FixedLoadAvg;

impl LoadAvgReader for FixedLoadAvg {
    fn read(&self) -> std::io::Result<LoadAvg> {
        Ok(LoadAvg {
            one: 0.5,
            five: 0.25,
            fifteen: 0.125,
        })
    }
}

/// A Telemetry API batch covering one cold invocation
pub fn cold_invocation_batch(request_id: &str) -> Value {
    json!([
        {
            "time": "2022-10-12T00:00:15.064Z",
            "type": "platform.initReport",
            "record": {
                "initializationType": "on-demand",
                "phase": "init",
                "status": "success",
                "metrics": {"durationMs": 125.0}
            }
        },
        {
            "time": "2022-10-12T00:00:15.064Z",
            "type": "platform.start",
            "record": {"requestId": request_id, "version": "$LATEST"}
        },
        {
            "time": "2022-10-12T00:00:15.300Z",
            "type": "function",
            "record": "hello from the handler"
        },
        {
            "time": "2022-10-12T00:00:15.400Z",
            "type": "platform.runtimeDone",
            "record": {
                "requestId": request_id,
                "status": "success",
                "metrics": {"durationMs": 300.0, "producedBytes": 53}
            }
        },
        {
            "time": "2022-10-12T00:00:15.500Z",
            "type": "platform.report",
            "record": {
                "requestId": request_id,
                "status": "success",
                "metrics": {
                    "durationMs": 400.0,
                    "billedDurationMs": 400,
                    "memorySizeMB": 128,
                    "maxMemoryUsedMB": 64,
                    "initDurationMs": 125.0
                }
            }
        }
    ])
}
