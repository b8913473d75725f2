use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use honeycomb_common::{
    CertificateMetadata, CertificatePayload, CertificateRequestPayload, HoneycombError,
    ServiceCertificate, EXPIRY_MS,
};
use honeycomb_http::errors::HoneycombAxumError;
use rsa::{
    pss::{Signature, SigningKey, VerifyingKey},
    signature::{Keypair, RandomizedSigner, SignatureEncoding, Verifier},
    RsaPrivateKey, RsaPublicKey,
};
use serde::Serialize;
use sha2::Sha256;
use std::{net::SocketAddr, sync::Arc};
use uuid::Uuid;

/// Owns the instance's RSA key pair. Created once at boot, held only in
/// memory, and destroyed with the process.
struct CertificateAuthority {
    instance_id: String,
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl CertificateAuthority {
    fn new(instance_id: String) -> anyhow::Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048)?;
        let signing_key = SigningKey::<Sha256>::new(private_key);
        let verifying_key = signing_key.verifying_key();
        Ok(Self { instance_id, signing_key, verifying_key })
    }

    /// Copies the request payload verbatim, appends fresh metadata, and
    /// signs the JSON canonicalization of the resulting payload under the
    /// instance private key.
    fn generate_certificate(&self, request: CertificateRequestPayload) -> Result<ServiceCertificate, HoneycombError> {
        let issued_at = honeycomb_common::now_ms();
        let payload = CertificatePayload {
            app: request.app,
            service: request.service,
            public_key: request.public_key,
            metadata: CertificateMetadata {
                deployment_id: Uuid::new_v4(),
                certificate_id: Uuid::new_v4(),
                instance_id: self.instance_id.clone(),
                issued_at,
                expires_at: issued_at + EXPIRY_MS,
            },
        };
        let bytes = serde_json::to_vec(&payload)?;
        let mut rng = rand::rngs::OsRng;
        let signature = self.signing_key.sign_with_rng(&mut rng, &bytes);
        Ok(ServiceCertificate { payload, signature: BASE64.encode(signature.to_bytes()) })
    }

    /// Recomputes the JSON encoding of `payload` and verifies the decoded
    /// base64 signature. Never fails on a bad signature, only on malformed
    /// input that can't even be checked, returning `verified=false` instead.
    fn verify_certificate(&self, cert: &ServiceCertificate) -> bool {
        let Ok(bytes) = serde_json::to_vec(&cert.payload) else { return false };
        let Ok(sig_bytes) = BASE64.decode(&cert.signature) else { return false };
        let Ok(signature) = Signature::try_from(sig_bytes.as_slice()) else { return false };
        self.verifying_key.verify(&bytes, &signature).is_ok()
    }

    fn public_key(&self) -> RsaPublicKey {
        self.verifying_key.as_ref().clone()
    }
}

#[derive(Clone)]
struct AppState {
    ca: Arc<CertificateAuthority>,
}

#[derive(Serialize)]
struct PublicKeyResponse {
    instance_id: String,
    #[serde(rename = "publicKeyDer")]
    public_key_der: String,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/certs", post(issue_certificate))
        .route("/api/v1/certs/:cert_id/verify", post(verify_certificate))
        .route("/api/v1/instance/public-key", get(public_key))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    honeycomb_http::tracing::init("honeycomb-ca");

    let instance_id = std::env::var("INSTANCE_ID").unwrap_or_else(|_| format!("ca-{}", Uuid::new_v4()));
    let ca = Arc::new(CertificateAuthority::new(instance_id.clone())?);

    let state = AppState { ca };
    let app = app(state);

    let addr: SocketAddr = honeycomb_http::config::bind_addr(([0, 0, 0, 0], 8020).into());
    tracing::info!(%addr, %instance_id, "honeycomb-ca listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    use rsa::pkcs8::EncodePublicKey;
    let public_key_der = match state.ca.public_key().to_public_key_der() {
        Ok(der) => BASE64.encode(der.as_bytes()),
        Err(_) => String::new(),
    };
    Json(PublicKeyResponse {
        instance_id: state.ca.instance_id.clone(),
        public_key_der,
    })
}

async fn issue_certificate(
    State(state): State<AppState>,
    Json(request): Json<CertificateRequestPayload>,
) -> Result<(StatusCode, [(&'static str, String); 1], Json<ServiceCertificate>), HoneycombAxumError> {
    let cert = state.ca.generate_certificate(request)?;
    let resource = format!("urn:hcp:cert:{}", cert.payload.metadata.certificate_id);
    tracing::info!(certificate_id = %cert.payload.metadata.certificate_id, "issued certificate");
    Ok((StatusCode::CREATED, [("X-HC2-Resource", resource)], Json(cert)))
}

async fn verify_certificate(
    State(state): State<AppState>,
    Path(_cert_id): Path<Uuid>,
    Json(cert): Json<ServiceCertificate>,
) -> Result<StatusCode, HoneycombAxumError> {
    if state.ca.verify_certificate(&cert) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HoneycombAxumError::problem(
            HoneycombError::cert_invalid("signature does not verify under the issuing instance's public key"),
            StatusCode::FORBIDDEN,
            "cert-invalid",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeycomb_common::{ApiDescriptor, ApiMethod, NetworkDescriptor, ServiceManifest};

    fn sample_manifest() -> ServiceManifest {
        ServiceManifest {
            name: "NOOPService".to_string(),
            version: "0.0.1".to_string(),
            depends_on: vec!["CacheService".to_string()],
            ports: vec![3001],
            api: ApiDescriptor {
                description: String::new(),
                methods: vec![ApiMethod {
                    name: "hello".to_string(),
                    params: serde_json::json!({"type": "object"}),
                    retryable: false,
                }],
            },
            network: NetworkDescriptor {
                internal_only: false,
                public_host_name: "noop".to_string(),
                rpc_endpoint: "http://noop_service:3001/rpc".to_string(),
            },
        }
    }

    #[test]
    fn generate_then_verify_round_trips() {
        let ca = CertificateAuthority::new("instance-1".to_string()).unwrap();
        let cert = ca
            .generate_certificate(CertificateRequestPayload {
                app: "current.ly".to_string(),
                service: sample_manifest(),
                public_key: "unused".to_string(),
            })
            .unwrap();

        assert!(ca.verify_certificate(&cert));
        assert_eq!(
            cert.payload.metadata.expires_at - cert.payload.metadata.issued_at,
            EXPIRY_MS
        );
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let ca = CertificateAuthority::new("instance-1".to_string()).unwrap();
        let mut cert = ca
            .generate_certificate(CertificateRequestPayload {
                app: "current.ly".to_string(),
                service: sample_manifest(),
                public_key: "unused".to_string(),
            })
            .unwrap();

        let mut raw = BASE64.decode(&cert.signature).unwrap();
        raw[0] ^= 0xFF;
        cert.signature = BASE64.encode(raw);

        assert!(!ca.verify_certificate(&cert));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let ca = CertificateAuthority::new("instance-1".to_string()).unwrap();
        let mut cert = ca
            .generate_certificate(CertificateRequestPayload {
                app: "current.ly".to_string(),
                service: sample_manifest(),
                public_key: "unused".to_string(),
            })
            .unwrap();

        cert.payload.service.version = "0.0.2".to_string();
        assert!(!ca.verify_certificate(&cert));
    }

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> Router {
        app(AppState { ca: Arc::new(CertificateAuthority::new("instance-1".to_string()).unwrap()) })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let response = test_app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn issue_then_verify_round_trips_over_http() {
        let app = test_app();
        let request = CertificateRequestPayload {
            app: "current.ly".to_string(),
            service: sample_manifest(),
            public_key: "unused".to_string(),
        };

        let issue_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certs")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&request).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(issue_response.status(), StatusCode::CREATED);
        let cert = body_json(issue_response).await;
        let certificate_id = cert["payload"]["metadata"]["certificate_id"].as_str().unwrap().to_string();

        let verify_response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/certs/{certificate_id}/verify"))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&cert).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(verify_response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn verify_rejects_tampered_certificate_over_http() {
        let app = test_app();
        let request = CertificateRequestPayload {
            app: "current.ly".to_string(),
            service: sample_manifest(),
            public_key: "unused".to_string(),
        };
        let issue_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/certs")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&request).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let mut cert = body_json(issue_response).await;
        cert["signature"] = serde_json::json!("dGFtcGVyZWQ=");
        let certificate_id = Uuid::new_v4();

        let verify_response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/certs/{certificate_id}/verify"))
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&cert).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(verify_response.status(), StatusCode::FORBIDDEN);
    }
}
