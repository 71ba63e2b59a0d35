// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock of the Lambda Runtime API serving the Extensions and Telemetry endpoints.
//!
//! `next` requests block until the test releases an event with [`MockRuntimeApi::send_event`].

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{body::Incoming, Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex as TokioMutex};

pub const EXTENSION_ID: &str = "test-extension-id";

#[derive(Clone)]
pub struct MockRuntimeApi {
    pub addr: SocketAddr,
    registered_names: Arc<Mutex<Vec<String>>>,
    subscriptions: Arc<Mutex<Vec<Value>>>,
    events_tx: mpsc::UnboundedSender<Value>,
}

#[derive(Clone)]
struct State {
    registered_names: Arc<Mutex<Vec<String>>>,
    subscriptions: Arc<Mutex<Vec<Value>>>,
    events_rx: Arc<TokioMutex<mpsc::UnboundedReceiver<Value>>>,
}

fn response(status: u16, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

async fn handle(req: Request<Incoming>, state: State) -> Result<Response<Full<Bytes>>, hyper::http::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let name = req
        .headers()
        .get("Lambda-Extension-Name")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes().to_vec())
        .unwrap_or_default();

    match (method, path.as_str()) {
        (Method::POST, "/2020-01-01/extension/register") => {
            state
                .registered_names
                .lock()
                .unwrap()
                .push(name.unwrap_or_default());
            Response::builder()
                .status(200)
                .header("Lambda-Extension-Identifier", EXTENSION_ID)
                .body(Full::new(Bytes::from("{}")))
        }
        (Method::PUT, "/2022-07-01/telemetry") => {
            let subscription = serde_json::from_slice(&body).unwrap_or(Value::Null);
            state.subscriptions.lock().unwrap().push(subscription);
            Ok(response(200, "OK"))
        }
        (Method::GET, "/2020-01-01/extension/event/next") => {
            let event = state.events_rx.lock().await.recv().await;
            match event {
                Some(event) => Ok(response(200, &event.to_string())),
                None => Ok(response(500, "no more events")),
            }
        }
        _ => Ok(response(404, "not found")),
    }
}

impl MockRuntimeApi {
    /// Start the mock on a random port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock runtime API");
        let addr = listener.local_addr().expect("Failed to get local addr");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = State {
            registered_names: Arc::new(Mutex::new(Vec::new())),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            events_rx: Arc::new(TokioMutex::new(events_rx)),
        };
        let api = MockRuntimeApi {
            addr,
            registered_names: state.registered_names.clone(),
            subscriptions: state.subscriptions.clone(),
            events_tx,
        };

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let io = TokioIo::new(stream);
                let state = state.clone();
                tokio::spawn(async move {
                    let service = hyper::service::service_fn(move |req| handle(req, state.clone()));
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(io, service)
                        .await;
                });
            }
        });

        api
    }

    /// `host:port`, the shape of `AWS_LAMBDA_RUNTIME_API`
    pub fn runtime_api(&self) -> String {
        self.addr.to_string()
    }

    /// Release one event to a pending (or the next) `next` request
    pub fn send_event(&self, event: Value) {
        self.events_tx.send(event).expect("mock runtime API stopped");
    }

    pub fn registered_names(&self) -> Vec<String> {
        self.registered_names.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<Value> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Waits until the extension has subscribed and returns the destination URI
    pub async fn wait_for_subscription(&self) -> String {
        for _ in 0..200 {
            if let Some(subscription) = self.subscriptions().first() {
                return subscription["destination"]["URI"]
                    .as_str()
                    .expect("subscription without URI")
                    .to_string();
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("extension never subscribed");
    }
}
