use axum::{extract::State, routing::post, Json, Router};
use honeycomb_common::{ApiDescriptor, ApiMethod, NetworkDescriptor, ServiceManifest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;

#[derive(Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    params: Value,
}

#[derive(Clone)]
struct AppState {
    store: Arc<RwLock<HashMap<String, Value>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("cache-service");

    let gateway_url = std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8010".to_string());
    let rpc_endpoint = std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "http://cache_service:3002/rpc".to_string());

    let sdk = honeycomb_sdk::Honeycomb::new(gateway_url)?;
    let manifest = ServiceManifest {
        name: "CacheService".to_string(),
        version: "0.0.1".to_string(),
        depends_on: vec![],
        ports: vec![3002],
        api: ApiDescriptor {
            description: String::new(),
            methods: vec![
                ApiMethod {
                    name: "get".to_string(),
                    params: json!({"type": "object", "properties": {"key": {"type": "string"}}, "required": ["key"]}),
                    retryable: true,
                },
                ApiMethod {
                    name: "set".to_string(),
                    params: json!({"type": "object", "properties": {"key": {"type": "string"}, "value": {}}, "required": ["key", "value"]}),
                    retryable: false,
                },
            ],
        },
        network: NetworkDescriptor { internal_only: true, public_host_name: "cache".to_string(), rpc_endpoint },
    };

    match sdk.register("current.ly", manifest).await {
        Ok(receipt) => tracing::info!(receipt_id = %receipt.receipt_id, "CacheService registered"),
        Err(err) => tracing::error!(%err, "CacheService registration failed"),
    }

    let state = AppState { store: Arc::new(RwLock::new(HashMap::new())) };
    let app = Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/healthz", axum::routing::get(|| async { "OK" }))
        .with_state(state);

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 3002).into());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "cache-service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_rpc(State(state): State<AppState>, Json(request): Json<RpcRequest>) -> Json<Value> {
    match request.method.as_str() {
        "CacheService.get" => {
            let Some(key) = request.params.get("key").and_then(Value::as_str) else {
                return Json(json!({ "jsonrpc": "2.0", "id": request.id, "error": { "message": "missing 'key'" } }));
            };
            let store = state.store.read().await;
            let value = store.get(key).cloned().unwrap_or(Value::Null);
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "value": value } }))
        }
        "CacheService.set" => {
            let Some(key) = request.params.get("key").and_then(Value::as_str) else {
                return Json(json!({ "jsonrpc": "2.0", "id": request.id, "error": { "message": "missing 'key'" } }));
            };
            let value = request.params.get("value").cloned().unwrap_or(Value::Null);
            state.store.write().await.insert(key.to_string(), value);
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "ok": true } }))
        }
        other => Json(json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "message": format!("no such method '{other}'") },
        })),
    }
}
