// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

use crate::errors::SinkError;
use crate::metric::MetricSample;

/// Destination of the aggregated metrics, bound to one backend host identity.
#[async_trait]
pub trait MetricsSink {
    /// Ships one dispatch cycle's worth of samples.
    async fn post_metrics(&self, samples: &[MetricSample]) -> Result<(), SinkError>;

    /// Tells the backend this host identity will not report again.
    async fn retire(&self) -> Result<(), SinkError>;
}
