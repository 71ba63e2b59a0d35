// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mackerel_lambda_extension::{
    config::{self, Config, BOOT_ID_PATH},
    log_level::LogLevel,
    logger,
    services::{self, ExtensionIdentity},
};

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = LogLevel::from_env();
    if let Err(e) = logger::init(log_level) {
        eprintln!("{} | ERROR | Failed to set up logging: {e}", logger::LOG_PREFIX);
    }
    debug!("Logging subsystem enabled at {}", log_level.as_ref());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let environment_id = match config::read_environment_id(Path::new(BOOT_ID_PATH)) {
        Ok(id) => id,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let extension_name = config::extension_name(&env::args().next().unwrap_or_default());

    let cancel_token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel_token.clone()));

    let identity = ExtensionIdentity::new(extension_name, environment_id);
    match services::run(config, identity, cancel_token).await {
        Ok(exit) => {
            info!("Extension stopped: {exit:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn cancel_on_signal(cancel_token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut terminate, mut interrupt) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(terminate), Ok(interrupt)) => (terminate, interrupt),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to install signal handlers: {e}");
                    return;
                }
            };
        let received = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
        };
        info!("Received {received}, terminating");
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            return;
        }
        info!("Received Ctrl-C, terminating");
    }

    cancel_token.cancel();
}
