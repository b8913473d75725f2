use axum::{routing::post, Json, Router};
use honeycomb_common::{ApiDescriptor, ApiMethod, NetworkDescriptor, ServiceManifest};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;

#[derive(Deserialize)]
struct RpcRequest {
    id: Value,
    method: String,
    params: Value,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("noop-service");

    let gateway_url = std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8010".to_string());
    let rpc_endpoint = std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "http://noop_service:3001/rpc".to_string());

    let sdk = honeycomb_sdk::Honeycomb::new(gateway_url)?;
    let manifest = ServiceManifest {
        name: "NOOPService".to_string(),
        version: "0.0.1".to_string(),
        depends_on: vec!["CacheService".to_string()],
        ports: vec![3001],
        api: ApiDescriptor {
            description: String::new(),
            methods: vec![ApiMethod {
                name: "hello".to_string(),
                params: json!({
                    "type": "object",
                    "properties": { "receiver": { "type": "string" } },
                    "required": ["receiver"],
                    "additionalProperties": false,
                }),
                retryable: false,
            }],
        },
        network: NetworkDescriptor { internal_only: false, public_host_name: "noop".to_string(), rpc_endpoint },
    };

    match sdk.register("current.ly", manifest).await {
        Ok(receipt) => tracing::info!(receipt_id = %receipt.receipt_id, "NOOPService registered"),
        Err(err) => tracing::error!(%err, "NOOPService registration failed"),
    }

    let app = Router::new().route("/rpc", post(handle_rpc)).route("/healthz", axum::routing::get(|| async { "OK" }));

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 3001).into());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "noop-service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_rpc(Json(request): Json<RpcRequest>) -> Json<Value> {
    match request.method.as_str() {
        "NOOPService.hello" => {
            let receiver = request.params.get("receiver").and_then(Value::as_str).unwrap_or("stranger");
            Json(json!({ "jsonrpc": "2.0", "id": request.id, "result": { "message": format!("hello, {receiver}") } }))
        }
        other => Json(json!({
            "jsonrpc": "2.0",
            "id": request.id,
            "error": { "message": format!("no such method '{other}'") },
        })),
    }
}
