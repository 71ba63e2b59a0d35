// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Extension lifecycle: register, subscribe, then wait on the platform for invocations
//! until it asks the extension to shut down.
//!
//! ```text
//! Init -> Registered -> Subscribed -> Waiting <-> Processing
//!                                        |
//!                                   ShuttingDown -> Terminated
//! ```
//!
//! While waiting, a background timer runs a paced dispatch every interval so telemetry is
//! shipped even when the function is not invoked for a long time. The timer is stopped
//! before the final forced dispatch, so nothing is posted after the host is retired.

use std::sync::Arc;
use std::time::Duration;
use telemetry_dispatch::{DispatchOutcome, Dispatcher, TelemetryListener};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::extension_api::{ExtensionApi, NextEvent};
use crate::telemetry_api::TelemetryApi;

pub const DEFAULT_DISPATCH_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Registered,
    Subscribed,
    Waiting,
    Processing,
    ShuttingDown,
    Terminated,
}

/// Why [`LifecycleController::run`] returned without an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunExit {
    /// The platform sent `SHUTDOWN`; the host was flushed and retired
    Shutdown { reason: String },
    /// The process was asked to stop by a signal; the host was left as is
    Cancelled,
}

pub struct LifecycleController {
    extension_api: Arc<dyn ExtensionApi + Send + Sync>,
    telemetry_api: Arc<dyn TelemetryApi + Send + Sync>,
    listener: Arc<TelemetryListener>,
    cancel_token: CancellationToken,
    dispatch_interval: Duration,
    state: LifecycleState,
    extension_id: Option<String>,
}

impl LifecycleController {
    #[must_use]
    pub fn new(
        extension_api: Arc<dyn ExtensionApi + Send + Sync>,
        telemetry_api: Arc<dyn TelemetryApi + Send + Sync>,
        listener: Arc<TelemetryListener>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            extension_api,
            telemetry_api,
            listener,
            cancel_token,
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            state: LifecycleState::Init,
            extension_id: None,
        }
    }

    #[must_use]
    pub fn with_dispatch_interval(mut self, dispatch_interval: Duration) -> Self {
        self.dispatch_interval = dispatch_interval;
        self
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn extension_id(&self) -> Option<&str> {
        self.extension_id.as_deref()
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), LifecycleError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }

    /// Registers the extension with the platform under `name`.
    pub async fn register(&mut self, name: &str) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Init)?;
        let id = self
            .extension_api
            .register(name)
            .await
            .map_err(LifecycleError::Register)?;
        info!("Registered extension {name}");
        self.extension_id = Some(id);
        self.state = LifecycleState::Registered;
        Ok(())
    }

    /// Starts the telemetry listener and subscribes it to the Telemetry API.
    pub async fn subscribe(&mut self) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Registered)?;
        let extension_id = self.extension_id.clone().unwrap_or_default();

        let uri = self.listener.start().await?;
        if let Err(e) = self.telemetry_api.subscribe(&extension_id, &uri).await {
            self.listener.shutdown().await;
            return Err(LifecycleError::Subscribe(e));
        }
        info!("Subscribed to the Telemetry API with {uri}");
        self.state = LifecycleState::Subscribed;
        Ok(())
    }

    /// Waits for platform events until shutdown, cancellation or a failed wait.
    ///
    /// Every invocation triggers a paced dispatch. `SHUTDOWN` stops the background timer,
    /// forces a final dispatch and retires the host. Cancellation exits without retiring.
    /// The telemetry listener is closed on every exit path.
    pub async fn run(&mut self, dispatcher: Arc<Dispatcher>) -> Result<RunExit, LifecycleError> {
        self.expect_state(LifecycleState::Subscribed)?;
        let extension_id = self.extension_id.clone().unwrap_or_default();

        let timer_token = self.cancel_token.child_token();
        let mut timer = Some(spawn_dispatch_timer(
            dispatcher.clone(),
            self.dispatch_interval,
            timer_token.clone(),
        ));

        let result = loop {
            self.state = LifecycleState::Waiting;
            debug!("Waiting for next event");

            let event = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Cancelled while waiting for next event");
                    break Ok(RunExit::Cancelled);
                }
                event = self.extension_api.next_event(&extension_id) => event,
            };

            match event {
                Ok(NextEvent::Invoke { request_id, .. }) => {
                    self.state = LifecycleState::Processing;
                    debug!("Invoke event for request {request_id}");
                    log_outcome(dispatcher.dispatch(false).await);
                }
                Ok(NextEvent::Shutdown {
                    shutdown_reason, ..
                }) => {
                    self.state = LifecycleState::ShuttingDown;
                    info!("Shutdown event: {shutdown_reason}");
                    stop_dispatch_timer(&timer_token, timer.take()).await;

                    let outcome = dispatcher.dispatch(true).await;
                    if let DispatchOutcome::Requeued { records } = outcome {
                        error!("Final dispatch failed, {records} telemetry records are lost");
                    }
                    log_outcome(outcome);

                    if let Err(e) = dispatcher.retire().await {
                        error!("Failed to retire host: {e}");
                    }
                    break Ok(RunExit::Shutdown {
                        reason: shutdown_reason,
                    });
                }
                Err(e) => break Err(LifecycleError::NextEvent(e)),
            }
        };

        stop_dispatch_timer(&timer_token, timer.take()).await;
        self.listener.shutdown().await;
        self.state = LifecycleState::Terminated;
        result
    }
}

fn log_outcome(outcome: DispatchOutcome) {
    debug!("Dispatch finished: {outcome:?}");
}

fn spawn_dispatch_timer(
    dispatcher: Arc<Dispatcher>,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                biased;
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => log_outcome(dispatcher.dispatch(false).await),
            }
        }
        debug!("Dispatch timer stopped");
    })
}

async fn stop_dispatch_timer(cancel_token: &CancellationToken, timer: Option<JoinHandle<()>>) {
    cancel_token.cancel();
    if let Some(timer) = timer {
        if let Err(e) = timer.await {
            warn!("Dispatch timer task failed: {e}");
        }
    }
}
