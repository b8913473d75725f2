use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use honeycomb_common::HoneycombError;
use honeycomb_http::errors::HoneycombAxumError;

use crate::GatewayState;

/// Forwards a request past `/api/v1/certs` or `/api/v1/services` through to
/// the Certificate Authority or Registry respectively, preserving method,
/// body and headers. The destination is fixed by path prefix rather than a
/// registered lookup table.
pub async fn reverse_proxy(
    State(state): State<GatewayState>,
    request: Request,
) -> Result<Response, HoneycombAxumError> {
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(|q| format!("?{q}")).unwrap_or_default();

    let upstream_base = if path.starts_with("/api/v1/certs") {
        &state.ca_url
    } else if path.starts_with("/api/v1/services") {
        &state.registry_url
    } else {
        return Ok((StatusCode::NOT_FOUND, "no route for path").into_response());
    };

    let method = request.method().clone();
    let headers = request.headers().clone();
    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|err| HoneycombError::Unknown(err.to_string()))?;

    let url = format!("{upstream_base}{path}{query}");
    let upstream_response = forward(&state.http, method, &url, headers, body).await?;

    let status = upstream_response.status();
    let response_headers = upstream_response.headers().clone();
    let response_body = upstream_response.bytes().await.map_err(HoneycombError::from)?;

    let mut response = Response::new(axum::body::Body::from(response_body));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    Ok(response)
}

async fn forward(
    http: &reqwest::Client,
    method: axum::http::Method,
    url: &str,
    headers: HeaderMap,
    body: Bytes,
) -> Result<reqwest::Response, HoneycombError> {
    let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let mut builder = http.request(reqwest_method, url).body(body);
    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    builder.send().await.map_err(HoneycombError::from)
}
