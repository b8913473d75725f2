use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use honeycomb_common::{ErrorCode, HoneycombError};
use serde::Serialize;

/// RFC 7807-flavored problem-detail body used by the CA, Registry and
/// Gateway HTTP surfaces.
#[derive(Debug, Serialize)]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub detail: String,
    pub instance: String,
}

/// Wraps [`HoneycombError`] to provide an Axum [`IntoResponse`] implementation.
///
/// This avoids Rust's orphan rules (Axum's trait + `honeycomb-common`'s type
/// are both external to leaf crates).
#[derive(Debug)]
pub struct HoneycombAxumError {
    pub err: HoneycombError,
    /// `/probs/<slug>` used as the problem `type`; defaults to a slug
    /// derived from the error code when absent.
    pub problem_type: Option<&'static str>,
    pub status: Option<StatusCode>,
}

impl From<HoneycombError> for HoneycombAxumError {
    fn from(value: HoneycombError) -> Self {
        Self { err: value, problem_type: None, status: None }
    }
}

impl From<reqwest::Error> for HoneycombAxumError {
    fn from(value: reqwest::Error) -> Self {
        HoneycombError::from(value).into()
    }
}

impl From<std::io::Error> for HoneycombAxumError {
    fn from(value: std::io::Error) -> Self {
        HoneycombError::from(value).into()
    }
}

impl From<serde_json::Error> for HoneycombAxumError {
    fn from(value: serde_json::Error) -> Self {
        HoneycombError::from(value).into()
    }
}

impl HoneycombAxumError {
    pub fn with_status(err: HoneycombError, status: StatusCode) -> Self {
        Self { err, problem_type: None, status: Some(status) }
    }

    pub fn problem(err: HoneycombError, status: StatusCode, problem_type: &'static str) -> Self {
        Self { err, problem_type: Some(problem_type), status: Some(status) }
    }

    pub fn status_code(&self) -> StatusCode {
        if let Some(s) = self.status {
            return s;
        }
        match self.err.code() {
            ErrorCode::ConfigInvalid => StatusCode::BAD_REQUEST,
            ErrorCode::SchemaInvalid => StatusCode::UNAUTHORIZED,
            ErrorCode::CertInvalid => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::NetworkTimeout | ErrorCode::NetworkError | ErrorCode::RedisError => StatusCode::BAD_GATEWAY,
            ErrorCode::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn default_slug(&self) -> &'static str {
        match self.err.code() {
            ErrorCode::SchemaInvalid => "cert-claims-invalid",
            ErrorCode::CertInvalid => "cert-invalid",
            ErrorCode::NotFound => "not-found",
            ErrorCode::ConfigInvalid => "config-invalid",
            _ => "internal-error",
        }
    }
}

impl IntoResponse for HoneycombAxumError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let slug = self.problem_type.unwrap_or_else(|| self.default_slug());
        let body = ProblemDetail {
            problem_type: format!("/probs/{slug}"),
            title: status.canonical_reason().unwrap_or("error").to_string(),
            detail: self.err.to_string(),
            instance: format!("urn:hcp:problem:{}", uuid::Uuid::new_v4()),
        };
        (status, Json(body)).into_response()
    }
}
