// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP endpoint the Lambda Telemetry API pushes record batches to.
//!
//! Each request body is a JSON array of records. Every element is appended to the
//! [`EventQueue`] in array order. The endpoint answers `200 OK` even when the body cannot
//! be parsed, so the platform never re-sends a batch we would reject again.
//!
//! Logging from the request path is limited to failures. If the function subscribes to its
//! own extension logs, anything written here comes back as a new telemetry record.

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{http, Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::constants::DEFAULT_LISTENER_PORT;
use crate::errors::ListenerError;
use crate::event_queue::{EventQueue, RawTelemetryRecord};
use crate::http_utils::{create_ok_response, log_and_create_http_response, HttpResponse};

pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

// Hostname of the execution environment as seen from the Telemetry API
const SANDBOX_HOST: &str = "sandbox";
const LOCAL_EMULATION_HOST: &str = "0.0.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryListenerConfig {
    /// Interface or hostname to bind to
    pub host: String,
    /// Port to bind to, 0 picks a free one
    pub port: u16,
}

impl TelemetryListenerConfig {
    /// Default bind address: all interfaces when the platform is emulated locally (SAM),
    /// the `sandbox` hostname inside the managed execution environment.
    #[must_use]
    pub fn for_environment(is_local_emulation: bool) -> Self {
        let host = if is_local_emulation {
            LOCAL_EMULATION_HOST
        } else {
            SANDBOX_HOST
        };
        Self {
            host: host.to_string(),
            port: DEFAULT_LISTENER_PORT,
        }
    }

    /// Host the platform should use to reach us. Unspecified addresses are not routable,
    /// so they are advertised as `localhost`.
    fn advertised_host(&self) -> &str {
        match self.host.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() => "localhost",
            _ => &self.host,
        }
    }
}

struct RunningServer {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct TelemetryListener {
    config: TelemetryListenerConfig,
    queue: EventQueue,
    server: Mutex<Option<RunningServer>>,
}

impl TelemetryListener {
    #[must_use]
    pub fn new(config: TelemetryListenerConfig, queue: EventQueue) -> Self {
        Self {
            config,
            queue,
            server: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Binds the listener and serves requests in a background task.
    ///
    /// Returns the URI to subscribe with the Telemetry API.
    pub async fn start(&self) -> Result<String, ListenerError> {
        let mut server = self.server.lock().await;
        if server.is_some() {
            return Err(ListenerError::AlreadyStarted);
        }

        let address = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(self.config.port);
        info!("Telemetry listener listening on {address} (port {port})");

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(
            serve(listener, self.queue.clone(), cancel_token.clone()).in_current_span(),
        );
        *server = Some(RunningServer {
            cancel_token,
            handle,
        });

        Ok(format!("http://{}:{}/", self.config.advertised_host(), port))
    }

    /// Stops accepting connections and gives in-flight requests up to
    /// [`SHUTDOWN_GRACE_PERIOD`] to finish. Calling it again, or before `start`, is a no-op.
    pub async fn shutdown(&self) {
        let Some(mut server) = self.server.lock().await.take() else {
            return;
        };

        server.cancel_token.cancel();
        match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut server.handle).await {
            Ok(Ok(())) => info!("Telemetry listener closed"),
            Ok(Err(e)) => error!("Telemetry listener task failed: {e}"),
            Err(_) => {
                warn!(
                    "Failed to shutdown telemetry listener gracefully within {:?}",
                    SHUTDOWN_GRACE_PERIOD
                );
                server.handle.abort();
            }
        }
    }
}

async fn serve(listener: TcpListener, queue: EventQueue, cancel_token: CancellationToken) {
    let server = hyper::server::conn::http1::Builder::new();
    let mut joinset = JoinSet::new();

    loop {
        let conn = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            con_res = listener.accept() => match con_res {
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionAborted
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Unexpected stop on telemetry listener: {e}");
                    break;
                }
                Ok((conn, _)) => conn,
            },
            finished = async {
                match joinset.join_next().await {
                    Some(finished) => finished,
                    None => std::future::pending().await,
                }
            } => match finished {
                Err(e) if e.is_panic() => {
                    error!("Telemetry connection handler panicked: {:?}", e);
                    continue;
                },
                Ok(()) | Err(_) => continue,
            },
        };

        let io = TokioIo::new(conn);
        let server = server.clone();
        let queue = queue.clone();
        let cancel_token = cancel_token.clone();
        let connection = async move {
            let service = service_fn(move |req| handle_request(req, queue.clone()));
            let conn = server.serve_connection(io, service);
            tokio::pin!(conn);
            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = cancel_token.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                warn!("Telemetry connection error: {e}");
            }
        };
        joinset.spawn(connection.in_current_span());
    }

    drop(listener);
    debug!("Telemetry listener stopped accepting, waiting for open connections");
    while joinset.join_next().await.is_some() {}
}

async fn handle_request(
    req: Request<Incoming>,
    queue: EventQueue,
) -> http::Result<HttpResponse> {
    if req.method() != Method::POST {
        return log_and_create_http_response(
            &format!("Unsupported method {} on telemetry listener", req.method()),
            StatusCode::METHOD_NOT_ALLOWED,
        );
    }

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Error reading telemetry body: {e}");
            return create_ok_response();
        }
    };

    match serde_json::from_slice::<Vec<RawTelemetryRecord>>(&body) {
        Ok(records) => queue.extend(records),
        Err(e) => warn!("Dropping telemetry batch that is not a JSON array: {e}"),
    }

    create_ok_response()
}
