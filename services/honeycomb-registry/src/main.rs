mod claims;
mod outer_sig;
mod receipt;

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use honeycomb_common::{
    ChangeEvent, HoneycombError, ReceiptDocument, ServiceCertificate, SignedRegistration,
};
use honeycomb_http::errors::HoneycombAxumError;
use redis::AsyncCommands;
use std::net::SocketAddr;
use tracing::info;

const RECEIPTS_PREFIX: &str = "honeycomb:receipts:";
const CHANGE_CHANNEL: &str = "honeycomb:changes";

#[derive(Clone)]
struct RegistryState {
    redis: redis::Client,
    http: reqwest::Client,
    ca_url: String,
}

fn app(state: RegistryState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api/v1/services", get(list_services).post(register))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("honeycomb-registry");

    let redis_url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let redis = redis::Client::open(redis_url.clone())?;

    let state = RegistryState {
        redis,
        http: reqwest::Client::new(),
        ca_url: std::env::var("CA_URL").unwrap_or_else(|_| "http://127.0.0.1:8020".to_string()),
    };
    let app = app(state);

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 8030).into());
    info!(%addr, %redis_url, "honeycomb-registry listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn list_services(
    State(state): State<RegistryState>,
) -> Result<Json<Vec<ReceiptDocument>>, HoneycombAxumError> {
    let mut con = state.redis.get_multiplexed_tokio_connection().await.map_err(HoneycombError::from)?;
    let keys: Vec<String> = con.keys(format!("{RECEIPTS_PREFIX}*")).await.map_err(HoneycombError::from)?;

    let mut docs = Vec::with_capacity(keys.len());
    for key in keys {
        let raw: String = con.get(&key).await.map_err(HoneycombError::from)?;
        if let Ok(doc) = serde_json::from_str::<ReceiptDocument>(&raw) {
            docs.push(doc);
        }
    }
    Ok(Json(docs))
}

/// Verifies the outer envelope signature, verifies the presented
/// certificate with the CA, validates the registration claims against it,
/// synthesizes and persists a receipt, and publishes the acceptance on the
/// change-feed channel. Any step failing aborts the registration with no
/// partial state.
async fn register(
    State(state): State<RegistryState>,
    Json(signed): Json<SignedRegistration>,
) -> Result<(StatusCode, [(&'static str, String); 2], Json<honeycomb_common::RegistrationReceipt>), HoneycombAxumError> {
    let registration = signed.payload;
    let cert_bytes = BASE64
        .decode(&registration.certificate)
        .map_err(|e| HoneycombError::claims_invalid(format!("certificate is not valid base64: {e}")))?;
    let cert: ServiceCertificate = serde_json::from_slice(&cert_bytes)
        .map_err(|e| HoneycombError::claims_invalid(format!("certificate envelope is malformed: {e}")))?;

    outer_sig::verify(&registration, &signed.signature, &cert.payload.public_key)
        .map_err(|e| HoneycombAxumError::problem(e, StatusCode::UNAUTHORIZED, "cert-claims-invalid"))?;
    verify_with_ca(&state, &cert).await?;
    claims::validate_claims(&cert.payload, &registration)
        .map_err(|e| HoneycombAxumError::problem(e, StatusCode::UNAUTHORIZED, "cert-claims-invalid"))?;

    let callback_url = registration.service.network.rpc_endpoint.clone();
    let receipt = receipt::synthesize(&registration, &cert, callback_url);
    let doc = ReceiptDocument { claims: registration.service.clone(), receipt: receipt.clone() };

    persist_and_publish(&state, &doc).await?;

    info!(receipt_id = %receipt.receipt_id, service = %receipt.service_name, "registered service instance");

    let headers = [("X-Count", "1".to_string()), ("X-HC2-Resource", receipt.urn.clone())];
    Ok((StatusCode::CREATED, headers, Json(receipt)))
}

async fn verify_with_ca(state: &RegistryState, cert: &ServiceCertificate) -> Result<(), HoneycombAxumError> {
    let url = format!(
        "{}/api/v1/certs/{}/verify",
        state.ca_url, cert.payload.metadata.certificate_id
    );
    let response = state.http.post(&url).json(cert).send().await.map_err(HoneycombError::from)?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(HoneycombAxumError::problem(
            HoneycombError::cert_invalid("certificate failed verification at the issuing CA"),
            StatusCode::UNAUTHORIZED,
            "cert-invalid",
        ))
    }
}

async fn persist_and_publish(state: &RegistryState, doc: &ReceiptDocument) -> Result<(), HoneycombError> {
    let mut con = state.redis.get_multiplexed_tokio_connection().await?;
    let key = format!("{RECEIPTS_PREFIX}{}", doc.receipt.receipt_id);
    let raw = serde_json::to_string(doc)?;
    con.set::<_, _, ()>(&key, &raw).await?;

    let event = ChangeEvent::Upserted(Box::new(doc.clone()));
    let event_raw = serde_json::to_string(&event)?;
    con.publish::<_, _, ()>(CHANGE_CHANNEL, event_raw).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeycomb_common::{
        ApiDescriptor, CertificateMetadata, CertificatePayload, NetworkDescriptor, RegistrationPayload,
        ServiceManifest,
    };
    use uuid::Uuid;

    fn manifest() -> ServiceManifest {
        ServiceManifest {
            name: "NOOPService".to_string(),
            version: "0.0.1".to_string(),
            depends_on: vec![],
            ports: vec![3001],
            api: ApiDescriptor { description: String::new(), methods: vec![] },
            network: NetworkDescriptor {
                internal_only: false,
                public_host_name: "noop".to_string(),
                rpc_endpoint: "http://noop:3001/rpc".to_string(),
            },
        }
    }

    fn cert() -> ServiceCertificate {
        ServiceCertificate {
            payload: CertificatePayload {
                app: "current.ly".to_string(),
                service: manifest(),
                public_key: "test-public-key".to_string(),
                metadata: CertificateMetadata {
                    deployment_id: Uuid::new_v4(),
                    certificate_id: Uuid::new_v4(),
                    instance_id: "test-instance-id".to_string(),
                    issued_at: 0,
                    expires_at: 0,
                },
            },
            signature: String::new(),
        }
    }

    #[test]
    fn receipt_synthesis_fills_every_field() {
        let registration = RegistrationPayload {
            app: "current.ly".to_string(),
            service: manifest(),
            certificate: BASE64.encode(b"{}"),
        };
        let cert = cert();
        let receipt = receipt::synthesize(&registration, &cert, "http://noop:3001/rpc".to_string());
        assert_eq!(receipt.expires_at - receipt.created_at, honeycomb_common::EXPIRY_MS);
        assert!(receipt.urn.starts_with("urn:hcp:hc2:service-registration-receipt:"));
        assert!(!receipt.alias.is_empty());
        assert_eq!(receipt.nonce.len(), 32);
        assert_eq!(receipt.instance_id, "test-instance-id");
        assert_eq!(receipt.instance_public_key, "test-public-key");
    }

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_reports_ok() {
        let state = RegistryState {
            redis: redis::Client::open("redis://127.0.0.1:1").unwrap(),
            http: reqwest::Client::new(),
            ca_url: "http://127.0.0.1:1".to_string(),
        };
        let response = app(state)
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
