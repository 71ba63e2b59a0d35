// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Unbounded FIFO between the telemetry listener and the dispatcher.
//!
//! Every HTTP request handled by the listener appends records here; the dispatcher
//! drains the whole queue at once at the start of a dispatch cycle. Appends never block
//! for longer than the critical section of a `VecDeque::push_back`, and a drain swaps the backing
//! storage out, so records appended while a cycle is running land in the next cycle.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// One telemetry record exactly as the platform delivered it
pub type RawTelemetryRecord = Value;

#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    records: Arc<Mutex<VecDeque<RawTelemetryRecord>>>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one record at the tail.
    pub fn append(&self, record: RawTelemetryRecord) {
        self.lock().push_back(record);
    }

    /// Adds records at the tail in iteration order, under a single lock acquisition.
    pub fn extend<I>(&self, records: I)
    where
        I: IntoIterator<Item = RawTelemetryRecord>,
    {
        self.lock().extend(records);
    }

    /// Removes and returns everything currently queued, oldest first.
    pub fn drain_all(&self) -> Vec<RawTelemetryRecord> {
        let drained = std::mem::take(&mut *self.lock());
        drained.into()
    }

    /// Puts records taken by a failed dispatch cycle back in front of anything that arrived
    /// in the meantime, so the queue stays in arrival order.
    pub fn requeue(&self, records: Vec<RawTelemetryRecord>) {
        let mut queue = self.lock();
        for record in records.into_iter().rev() {
            queue.push_front(record);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock can only happen inside VecDeque itself; the data is
    // still a valid queue, so keep going with it.
    fn lock(&self) -> MutexGuard<'_, VecDeque<RawTelemetryRecord>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
