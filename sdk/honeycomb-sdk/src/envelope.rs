use serde::{Deserialize, Serialize};

/// Layer that produced a [`ResultEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Sdk,
    Proxy,
    Service,
}

/// The closed error-code set a dispatch call may fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "HC2_ROUTE_NOT_FOUND")]
    RouteNotFound,
    #[serde(rename = "HC2_METHOD_NOT_FOUND")]
    MethodNotFound,
    #[serde(rename = "HC2_SDK_INTERNAL_ERROR")]
    SdkInternalError,
    #[serde(rename = "HC2_SERVICE_UNAVAILABLE")]
    ServiceUnavailable,
    #[serde(rename = "HC2_RPC_TIMEOUT")]
    RpcTimeout,
    #[serde(rename = "HC2_RPC_ERROR")]
    RpcError,
    #[serde(rename = "HC2_INVALID_PARAMS")]
    InvalidParams,
    #[serde(rename = "HC2_SERVICE_ERROR")]
    ServiceError,
    #[serde(rename = "HC2_ALL_INSTANCES_FAILED")]
    AllInstancesFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: ErrorCode,
    pub message: String,
    pub source: Source,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub service: String,
    pub method: String,
    pub source: Source,
    pub timestamp: i64,
}

/// Every SDK-facing call returns one of these, never a raw `Err`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    #[serde(rename = "__metadata")]
    pub metadata: Metadata,
    pub has_error: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<EnvelopeError>,
}

impl ResultEnvelope {
    pub fn success(service: &str, method: &str, source: Source, data: serde_json::Value) -> Self {
        Self {
            metadata: Metadata {
                service: service.to_string(),
                method: method.to_string(),
                source,
                timestamp: honeycomb_common::now_ms(),
            },
            has_error: false,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(service: &str, method: &str, source: Source, code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            metadata: Metadata {
                service: service.to_string(),
                method: method.to_string(),
                source,
                timestamp: honeycomb_common::now_ms(),
            },
            has_error: true,
            data: None,
            error: Some(EnvelopeError { code, message: message.into(), source, retryable }),
        }
    }
}
