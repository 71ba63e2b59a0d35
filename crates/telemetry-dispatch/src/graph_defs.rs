// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use crate::constants::{
    AGGREGATION_SUFFIXES, INIT_REPORT_DURATION, LOADAVG_1, LOADAVG_15, LOADAVG_5,
    REPORT_BILLED_DURATION, REPORT_DURATION, REPORT_INIT_DURATION, REPORT_MAX_MEMORY_USED,
    REPORT_MEMORY_SIZE, RUNTIME_DONE_DURATION, RUNTIME_DONE_PRODUCED_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphUnit {
    Seconds,
    Bytes,
    Float,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefMetric {
    pub name: String,
    pub display_name: String,
    pub is_stacked: bool,
}

/// One graph on the host page, as accepted by `/api/v0/graph-defs/create`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDef {
    pub name: String,
    pub display_name: String,
    pub unit: GraphUnit,
    pub metrics: Vec<GraphDefMetric>,
}

impl GraphDef {
    /// Graph of the `.avg`, `.max` and `.min` series derived from `base`.
    fn aggregated(base: &str, display_name: &str, unit: GraphUnit) -> Self {
        let metrics = AGGREGATION_SUFFIXES
            .iter()
            .map(|suffix| GraphDefMetric {
                name: format!("{base}.{suffix}"),
                display_name: (*suffix).to_string(),
                is_stacked: false,
            })
            .collect();
        Self {
            name: base.to_string(),
            display_name: display_name.to_string(),
            unit,
            metrics,
        }
    }
}

fn unaggregated(metric: &str) -> GraphDefMetric {
    GraphDefMetric {
        name: metric.to_string(),
        display_name: metric.rsplit('.').next().unwrap_or(metric).to_string(),
        is_stacked: false,
    }
}

/// Every graph the extension reports into.
#[must_use]
pub fn graph_defs() -> Vec<GraphDef> {
    let mut defs = vec![GraphDef {
        name: "custom.lambda.platform.initReport.duration".to_string(),
        display_name: "Init Duration".to_string(),
        unit: GraphUnit::Seconds,
        metrics: vec![unaggregated(INIT_REPORT_DURATION)],
    }];

    defs.extend(
        [
            (REPORT_BILLED_DURATION, "Billed Duration", GraphUnit::Seconds),
            (REPORT_DURATION, "Invoke Duration", GraphUnit::Seconds),
            (REPORT_INIT_DURATION, "Invoke Init Duration", GraphUnit::Seconds),
            (REPORT_MAX_MEMORY_USED, "Max Memory Used", GraphUnit::Bytes),
            (REPORT_MEMORY_SIZE, "Memory Size", GraphUnit::Bytes),
            (RUNTIME_DONE_DURATION, "Done Duration", GraphUnit::Seconds),
            (RUNTIME_DONE_PRODUCED_BYTES, "Produced Bytes", GraphUnit::Bytes),
        ]
        .into_iter()
        .map(|(base, display_name, unit)| GraphDef::aggregated(base, display_name, unit)),
    );

    defs.push(GraphDef {
        name: "custom.lambda.osstat.loadavg".to_string(),
        display_name: "loadavg".to_string(),
        unit: GraphUnit::Float,
        metrics: [LOADAVG_1, LOADAVG_5, LOADAVG_15]
            .into_iter()
            .map(unaggregated)
            .collect(),
    });

    defs
}
