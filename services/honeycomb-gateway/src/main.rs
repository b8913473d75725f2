mod proxy;
mod registry_feed;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use honeycomb_common::ServiceProfile;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use registry_feed::ProfileTable;
use std::{net::SocketAddr, sync::OnceLock};
use tracing::info;

/// Redis key prefix under which the Registry persists one entry per
/// accepted registration (`honeycomb:receipts:<receiptId>`).
pub const RECEIPTS_PREFIX: &str = "honeycomb:receipts:";
/// Pub/Sub channel the Registry publishes change events to.
pub const CHANGE_CHANNEL: &str = "honeycomb:changes";

static METRICS: OnceLock<PrometheusHandle> = OnceLock::new();

fn init_metrics() {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    let _ = METRICS.set(handle);
}

async fn metrics_handler() -> impl IntoResponse {
    let Some(h) = METRICS.get() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not initialized").into_response();
    };
    (StatusCode::OK, h.render()).into_response()
}

#[derive(Clone)]
struct GatewayState {
    profiles: ProfileTable,
    http: reqwest::Client,
    ca_url: String,
    registry_url: String,
}

fn app(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/healthz", get(|| async { "OK" }))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/profiles", get(list_profiles))
        .route("/api/v1/profiles/:service_name", get(get_profile))
        .route("/api/v1/certs", any(proxy::reverse_proxy))
        .route("/api/v1/certs/*rest", any(proxy::reverse_proxy))
        .route("/api/v1/services", any(proxy::reverse_proxy))
        .route("/api/v1/services/*rest", any(proxy::reverse_proxy))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("honeycomb-gateway");
    init_metrics();

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let redis_client = redis::Client::open(redis_url.clone())?;

    let profiles = registry_feed::bootstrap(&redis_client).await?;

    let feed_client = redis_client.clone();
    let feed_table = profiles.clone();
    tokio::spawn(async move {
        registry_feed::follow(feed_client, feed_table).await;
    });

    let state = GatewayState {
        profiles,
        http: reqwest::Client::new(),
        ca_url: std::env::var("CA_URL").unwrap_or_else(|_| "http://127.0.0.1:8020".to_string()),
        registry_url: std::env::var("REGISTRY_URL").unwrap_or_else(|_| "http://127.0.0.1:8030".to_string()),
    };

    let app = app(state);

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 8010).into());
    info!(%addr, %redis_url, "honeycomb-gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn list_profiles(State(state): State<GatewayState>) -> Json<Vec<ServiceProfile>> {
    let table = state.profiles.read().await;
    Json(table.values().cloned().collect())
}

async fn get_profile(
    Path(service_name): Path<String>,
    State(state): State<GatewayState>,
) -> Result<Json<ServiceProfile>, StatusCode> {
    let table = state.profiles.read().await;
    table.get(&service_name).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use honeycomb_common::{ApiDescriptor, ServiceInstance};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn test_state(profiles: HashMap<String, ServiceProfile>) -> GatewayState {
        GatewayState {
            profiles: Arc::new(RwLock::new(profiles)),
            http: reqwest::Client::new(),
            ca_url: "http://127.0.0.1:1".to_string(),
            registry_url: "http://127.0.0.1:1".to_string(),
        }
    }

    fn sample_profile() -> ServiceProfile {
        ServiceProfile {
            name: "NOOPService".to_string(),
            version: "0.0.1".to_string(),
            depends_on: vec![],
            ports: vec![3001],
            api: ApiDescriptor { description: String::new(), methods: vec![] },
            instances: vec![ServiceInstance {
                id: Uuid::new_v4(),
                receipt_id: Uuid::new_v4(),
                created_at: 0,
                rpc_endpoint: "http://noop:3001/rpc".to_string(),
                urn: "urn:hcp:hc2:service-registration-receipt:test".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = app(test_state(HashMap::new()))
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_profiles_reflects_the_route_table() {
        let mut profiles = HashMap::new();
        profiles.insert("NOOPService".to_string(), sample_profile());

        let response = app(test_state(profiles))
            .oneshot(Request::builder().uri("/api/v1/profiles").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Vec<ServiceProfile> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].name, "NOOPService");
    }

    #[tokio::test]
    async fn get_profile_for_unknown_service_is_not_found() {
        let response = app(test_state(HashMap::new()))
            .oneshot(Request::builder().uri("/api/v1/profiles/Ghost").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_profile_for_known_service_returns_it() {
        let mut profiles = HashMap::new();
        profiles.insert("NOOPService".to_string(), sample_profile());

        let response = app(test_state(profiles))
            .oneshot(Request::builder().uri("/api/v1/profiles/NOOPService").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ServiceProfile = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.instances.len(), 1);
    }
}
