// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dispatch cycle: drain the event queue, turn records into metrics, ship them.
//!
//! A cycle runs at most once per pacing interval unless forced. Cycles are serialized by
//! the mutex guarding [`DispatchState`], so the periodic timer and the invocation loop can
//! both call [`Dispatcher::dispatch`] without double-draining or racing on the pacing
//! timestamp. When the sink rejects a batch, the raw records (not the derived metrics) go
//! back to the queue and are reclassified on the next cycle.

use chrono::{DateTime, Utc};
use host_metrics_collector::LoadAvgReader;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::constants::{LOADAVG_1, LOADAVG_15, LOADAVG_5};
use crate::errors::SinkError;
use crate::event_queue::{EventQueue, RawTelemetryRecord};
use crate::metric::{aggregate, MetricSample};
use crate::sink::MetricsSink;
use crate::telemetry_event::TelemetryEvent;

pub const DEFAULT_PACING_INTERVAL: Duration = Duration::from_secs(60);

// Past this many queued records after a failed post, every requeue is reported.
const QUEUE_BACKLOG_WARN_THRESHOLD: usize = 10_000;

/// What a call to [`Dispatcher::dispatch`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was queued
    EmptyQueue,
    /// The previous successful post is too recent and the call was not forced
    Paced,
    /// Records were drained but none of them produced a metric
    NoMetrics { records: usize },
    /// The sink accepted the batch
    Posted { records: usize, samples: usize },
    /// The sink rejected the batch and the records were put back in the queue
    Requeued { records: usize },
}

#[derive(Debug)]
struct DispatchState {
    last_posted_at: DateTime<Utc>,
}

impl DispatchState {
    fn pacing_window_elapsed(&self, now: DateTime<Utc>, pacing_interval: Duration) -> bool {
        now.signed_duration_since(self.last_posted_at)
            .to_std()
            .is_ok_and(|elapsed| elapsed >= pacing_interval)
    }
}

pub struct Dispatcher {
    queue: EventQueue,
    sink: Arc<dyn MetricsSink + Send + Sync>,
    load_avg_reader: Arc<dyn LoadAvgReader + Send + Sync>,
    pacing_interval: Duration,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        queue: EventQueue,
        sink: Arc<dyn MetricsSink + Send + Sync>,
        load_avg_reader: Arc<dyn LoadAvgReader + Send + Sync>,
    ) -> Self {
        Self {
            queue,
            sink,
            load_avg_reader,
            pacing_interval: DEFAULT_PACING_INTERVAL,
            state: Mutex::new(DispatchState {
                last_posted_at: DateTime::<Utc>::default(),
            }),
        }
    }

    #[must_use]
    pub fn with_pacing_interval(mut self, pacing_interval: Duration) -> Self {
        self.pacing_interval = pacing_interval;
        self
    }

    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Runs one dispatch cycle.
    ///
    /// `force` skips the pacing check; it is used for the final flush at shutdown.
    pub async fn dispatch(&self, force: bool) -> DispatchOutcome {
        let mut state = self.state.lock().await;

        if self.queue.is_empty() {
            return DispatchOutcome::EmptyQueue;
        }

        let now = Utc::now();
        if !force && !state.pacing_window_elapsed(now, self.pacing_interval) {
            debug!(
                "Last post at {} is within the pacing interval, holding {} telemetry records",
                state.last_posted_at,
                self.queue.len()
            );
            return DispatchOutcome::Paced;
        }

        let records = self.queue.drain_all();
        info!("Dispatching {} telemetry records", records.len());

        let mut metrics = aggregate(gather_samples(&records), now.timestamp());
        if metrics.is_empty() {
            debug!("No metrics in {} telemetry records", records.len());
            return DispatchOutcome::NoMetrics {
                records: records.len(),
            };
        }
        self.append_load_avg(&mut metrics, now.timestamp());

        match self.sink.post_metrics(&metrics).await {
            Ok(()) => {
                state.last_posted_at = now;
                debug!("Posted {} metrics", metrics.len());
                DispatchOutcome::Posted {
                    records: records.len(),
                    samples: metrics.len(),
                }
            }
            Err(e) => {
                let n_records = records.len();
                error!(
                    "Failed to post {} metrics, requeueing {} telemetry records: {}",
                    metrics.len(),
                    n_records,
                    e
                );
                self.queue.requeue(records);
                let backlog = self.queue.len();
                if backlog > QUEUE_BACKLOG_WARN_THRESHOLD {
                    warn!("{backlog} telemetry records are waiting to be dispatched");
                }
                DispatchOutcome::Requeued { records: n_records }
            }
        }
    }

    /// Retires the sink's host identity.
    ///
    /// Takes the dispatch lock, so no cycle can post after (or while) the host is retired.
    pub async fn retire(&self) -> Result<(), SinkError> {
        let _state = self.state.lock().await;
        self.sink.retire().await
    }

    fn append_load_avg(&self, metrics: &mut Vec<MetricSample>, now: i64) {
        match self.load_avg_reader.read() {
            Ok(load) => metrics.extend([
                MetricSample::new(LOADAVG_1, now, load.one),
                MetricSample::new(LOADAVG_5, now, load.five),
                MetricSample::new(LOADAVG_15, now, load.fifteen),
            ]),
            Err(e) => warn!("Failed to get loadavg: {e}"),
        }
    }
}

fn gather_samples(records: &[RawTelemetryRecord]) -> Vec<MetricSample> {
    let mut samples = Vec::with_capacity(records.len() * 2);
    for record in records {
        match TelemetryEvent::from_record(record) {
            Ok(TelemetryEvent::Other) => debug!("Ignoring telemetry record: {record}"),
            Ok(event) => {
                debug!("Telemetry event: {event:?}");
                samples.extend(event.samples());
            }
            Err(e) => warn!("{e}"),
        }
    }
    samples
}
