// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use http_body_util::Full;
use hyper::{body::Bytes, http, Response, StatusCode};
use serde_json::json;
use tracing::warn;

pub type HttpResponse = Response<Full<Bytes>>;

/// Empty `200 OK`. Deliberately silent: the listener must not write log lines while it is
/// handling telemetry, or the platform would deliver those lines back to it as telemetry.
pub fn create_ok_response() -> http::Result<HttpResponse> {
    Response::builder()
        .status(StatusCode::OK)
        .body(Full::new(Bytes::new()))
}

/// Logs the given message as a warning and returns it as a JSON body with the given status:
///
/// {
///     "message": message
/// }
pub fn log_and_create_http_response(
    message: &str,
    status: StatusCode,
) -> http::Result<HttpResponse> {
    warn!("{message}");
    let body = json!({ "message": message }).to_string();
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
}
