// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wires the platform clients, the telemetry pipeline and the Mackerel host together and
//! drives them through the extension lifecycle.

use std::path::PathBuf;
use std::sync::Arc;
use telemetry_dispatch::graph_defs::graph_defs;
use telemetry_dispatch::mackerel::{
    create_or_get_host, CreateHostParam, MackerelClient, HOST_ID_FILE_PATH,
};
use telemetry_dispatch::{Dispatcher, EventQueue, TelemetryListener};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::LifecycleError;
use crate::extension_api::ExtensionApiClient;
use crate::lifecycle::{LifecycleController, RunExit};
use crate::secrets::resolve_api_key;
use crate::telemetry_api::TelemetryApiClient;

/// What the extension needs to know about itself besides [`Config`]
#[derive(Debug, Clone)]
pub struct ExtensionIdentity {
    /// Name registered with the Extensions API
    pub extension_name: String,
    /// Execution environment id, used as the Mackerel host name
    pub environment_id: String,
    /// File the Mackerel host id is kept in between restarts
    pub host_id_file: PathBuf,
}

impl ExtensionIdentity {
    #[must_use]
    pub fn new(extension_name: String, environment_id: String) -> Self {
        Self {
            extension_name,
            environment_id,
            host_id_file: PathBuf::from(HOST_ID_FILE_PATH),
        }
    }
}

/// Runs the extension until the platform shuts it down or `cancel_token` is cancelled.
///
/// Registration, subscription, host creation and graph definition failures are returned
/// as errors; the caller is expected to exit.
pub async fn run(
    config: Config,
    identity: ExtensionIdentity,
    cancel_token: CancellationToken,
) -> Result<RunExit, LifecycleError> {
    let queue = EventQueue::new();
    let listener = Arc::new(TelemetryListener::new(
        config.listener.clone(),
        queue.clone(),
    ));
    let mut controller = LifecycleController::new(
        Arc::new(ExtensionApiClient::new(&config.runtime_api)),
        Arc::new(TelemetryApiClient::new(&config.runtime_api)),
        listener,
        cancel_token,
    );

    controller.register(&identity.extension_name).await?;
    controller.subscribe().await?;

    let api_key = resolve_api_key(&config).await?;
    let client = MackerelClient::new(api_key, config.api_base.clone())?;
    let host = create_or_get_host(
        client,
        &CreateHostParam {
            name: identity.environment_id.clone(),
            display_name: config.function_name.clone(),
            role_fullnames: config.role_fullnames.clone(),
        },
        &identity.host_id_file,
    )
    .await?;
    host.create_graph_defs(&graph_defs()).await?;
    info!("Reporting as Mackerel host {}", host.id());

    let load_avg_reader = Arc::from(host_metrics_collector::platform_reader());
    let dispatcher = Arc::new(Dispatcher::new(queue, Arc::new(host), load_avg_reader));
    debug!("Starting event loop");
    controller.run(dispatcher).await
}
