// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use crate::constants::INIT_REPORT_DURATION;

/// A single named value at a point in time, in the shape the Mackerel API expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSample {
    pub name: String,
    /// Unix timestamp in seconds
    pub time: i64,
    pub value: f64,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, time: i64, value: f64) -> Self {
        Self {
            name: name.into(),
            time,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Summary {
    sum: f64,
    count: usize,
    max: f64,
    min: f64,
}

impl Summary {
    fn new(value: f64) -> Self {
        Self {
            sum: value,
            count: 1,
            max: value,
            min: value,
        }
    }

    fn insert(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.max = self.max.max(value);
        self.min = self.min.min(value);
    }

    fn avg(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Collapses one dispatch cycle's samples into the series sent to the backend.
///
/// The cold start duration passes through untouched. Every other name becomes three
/// samples, `<name>.avg`, `<name>.max` and `<name>.min`, all stamped with `now`.
/// Output order is stable: the cold start sample first, then names in lexical order.
pub fn aggregate(samples: Vec<MetricSample>, now: i64) -> Vec<MetricSample> {
    let mut init_duration: Option<MetricSample> = None;
    let mut summaries: BTreeMap<String, Summary> = BTreeMap::new();

    for sample in samples {
        if sample.name == INIT_REPORT_DURATION {
            if init_duration.is_some() {
                warn!(
                    "More than one {} sample in a single dispatch, keeping the first",
                    INIT_REPORT_DURATION
                );
            } else {
                init_duration = Some(sample);
            }
            continue;
        }

        let value = sample.value;
        summaries
            .entry(sample.name)
            .and_modify(|summary| summary.insert(value))
            .or_insert_with(|| Summary::new(value));
    }

    let mut aggregated = Vec::with_capacity(summaries.len() * 3 + 1);
    aggregated.extend(init_duration);
    for (name, summary) in summaries {
        aggregated.push(MetricSample::new(format!("{name}.avg"), now, summary.avg()));
        aggregated.push(MetricSample::new(format!("{name}.max"), now, summary.max));
        aggregated.push(MetricSample::new(format!("{name}.min"), now, summary.min));
    }
    aggregated
}
