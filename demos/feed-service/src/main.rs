use axum::{extract::State, routing::post, Json, Router};
use honeycomb_common::{ApiDescriptor, ApiMethod, NetworkDescriptor, ServiceManifest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;

#[derive(Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    params: Value,
}

#[derive(Clone)]
struct AppState {
    entries: Arc<RwLock<Vec<Value>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("feed-service");

    let gateway_url = std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8010".to_string());
    let rpc_endpoint = std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "http://feed_service:3003/rpc".to_string());

    let sdk = honeycomb_sdk::Honeycomb::new(gateway_url)?;
    let manifest = ServiceManifest {
        name: "FeedService".to_string(),
        version: "0.0.1".to_string(),
        depends_on: vec!["CacheService".to_string()],
        ports: vec![3003],
        api: ApiDescriptor {
            description: String::new(),
            methods: vec![
                ApiMethod {
                    name: "publish".to_string(),
                    params: json!({"type": "object", "properties": {"entry": {}}, "required": ["entry"]}),
                    retryable: false,
                },
                ApiMethod { name: "list".to_string(), params: json!({"type": "object"}), retryable: true },
            ],
        },
        network: NetworkDescriptor { internal_only: false, public_host_name: "feed".to_string(), rpc_endpoint },
    };

    match sdk.register("current.ly", manifest).await {
        Ok(receipt) => tracing::info!(receipt_id = %receipt.receipt_id, "FeedService registered"),
        Err(err) => tracing::error!(%err, "FeedService registration failed"),
    }

    let state = AppState { entries: Arc::new(RwLock::new(Vec::new())) };
    let app = Router::new()
        .route("/rpc", post(handle_rpc))
        .route("/healthz", axum::routing::get(|| async { "OK" }))
        .with_state(state);

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 3003).into());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "feed-service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_rpc(State(state): State<AppState>, Json(request): Json<RpcRequest>) -> Json<Value> {
    match request.method.as_str() {
        "FeedService.publish" => {
            let entry = request.params.get("entry").cloned().unwrap_or(Value::Null);
            state.entries.write().await.push(entry);
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "ok": true } }))
        }
        "FeedService.list" => {
            let entries = state.entries.read().await;
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "entries": *entries } }))
        }
        other => Json(json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "message": format!("no such method '{other}'") },
        })),
    }
}
