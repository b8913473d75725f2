use crate::envelope::ErrorCode;
use honeycomb_common::ServiceInstance;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct InstanceFailure {
    pub code: ErrorCode,
    pub message: String,
    pub retry_after: Option<Duration>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
    #[serde(default)]
    retry_after_ms: Option<u64>,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Single JSON-RPC 2.0 round trip against one instance. Maps transport and
/// protocol failures onto the SDK's error taxonomy; a JSON-RPC `error`
/// object in the response is a service-reported failure, distinct from a
/// transport error.
pub async fn call_instance(
    http: &reqwest::Client,
    service: &str,
    method: &str,
    params: &serde_json::Value,
    instance: &ServiceInstance,
) -> Result<serde_json::Value, InstanceFailure> {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": Uuid::new_v4().to_string(),
        "method": format!("{service}.{method}"),
        "params": params,
    });

    let response = http
        .post(&instance.rpc_endpoint)
        .timeout(CALL_TIMEOUT)
        .json(&body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                InstanceFailure { code: ErrorCode::RpcTimeout, message: e.to_string(), retry_after: None }
            } else {
                InstanceFailure { code: ErrorCode::ServiceUnavailable, message: e.to_string(), retry_after: None }
            }
        })?;

    let rpc: JsonRpcResponse = response.json().await.map_err(|e| InstanceFailure {
        code: ErrorCode::RpcError,
        message: format!("malformed RPC response: {e}"),
        retry_after: None,
    })?;

    if let Some(err) = rpc.error {
        return Err(InstanceFailure {
            code: ErrorCode::ServiceError,
            message: err.message,
            retry_after: err.retry_after_ms.map(Duration::from_millis),
        });
    }

    Ok(rpc.result.unwrap_or(serde_json::Value::Null))
}
