pub mod dispatch;
pub mod envelope;
pub mod sync;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use envelope::{ErrorCode, ResultEnvelope, Source};
use honeycomb_common::{
    CertificateRequestPayload, HoneycombError, RegistrationPayload, ServiceCertificate, ServiceManifest,
    ServiceProfile, SignedRegistration,
};
use rsa::{
    pkcs8::EncodePublicKey,
    pss::SigningKey,
    signature::{RandomizedSigner, SignatureEncoding},
    RsaPrivateKey,
};
use sha2::Sha256;
use std::collections::HashMap;
use sync::SyncInfo;
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;

/// The platform's client-side entry point: registers this process's
/// service with the CA/Registry, lazily syncs the Gateway's profile view,
/// and exposes `invoke`/`ServiceHandle` for RPC dispatch. Never panics or
/// propagates an `Err` from a public method, failures normalize into a
/// [`ResultEnvelope`].
pub struct Honeycomb {
    http: reqwest::Client,
    gateway_url: String,
    sync: OnceCell<SyncInfo>,
    routes: Mutex<HashMap<String, ServiceProfile>>,
    signing_key: SigningKey<Sha256>,
}

impl Honeycomb {
    pub fn new(gateway_url: impl Into<String>) -> anyhow::Result<Self> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)?;
        Ok(Self {
            http: reqwest::Client::new(),
            gateway_url: gateway_url.into(),
            sync: OnceCell::new(),
            routes: Mutex::new(HashMap::new()),
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    fn public_key_b64(&self) -> Result<String, HoneycombError> {
        use rsa::signature::Keypair;
        let public_key = self.signing_key.verifying_key();
        let der = public_key
            .as_ref()
            .to_public_key_der()
            .map_err(|e| HoneycombError::config(format!("failed to encode SDK public key: {e}")))?;
        Ok(BASE64.encode(der.as_bytes()))
    }

    /// Requests a certificate for `app`/`manifest` from the CA, then
    /// registers it with the Registry. Returns the synthesized receipt.
    pub async fn register(
        &self,
        app: &str,
        manifest: ServiceManifest,
    ) -> Result<honeycomb_common::RegistrationReceipt, HoneycombError> {
        let public_key = self.public_key_b64()?;
        let cert_request = CertificateRequestPayload { app: app.to_string(), service: manifest.clone(), public_key };

        let cert_response = self
            .http
            .post(format!("{}/api/v1/certs", self.gateway_url))
            .json(&cert_request)
            .send()
            .await?;
        if !cert_response.status().is_success() {
            return Err(HoneycombError::cert_invalid(format!(
                "certificate issuance failed with status {}",
                cert_response.status()
            )));
        }
        let cert: ServiceCertificate = cert_response.json().await?;

        let verify_url = format!(
            "{}/api/v1/certs/{}/verify",
            self.gateway_url, cert.payload.metadata.certificate_id
        );
        let verify_response = self.http.post(&verify_url).json(&cert).send().await?;
        if !verify_response.status().is_success() {
            return Err(HoneycombError::cert_invalid("issued certificate failed immediate verification"));
        }

        let registration = RegistrationPayload {
            app: app.to_string(),
            service: manifest,
            certificate: BASE64.encode(serde_json::to_vec(&cert)?),
        };
        let payload_bytes = serde_json::to_vec(&registration)?;
        let signature = self.signing_key.sign_with_rng(&mut rand::rngs::OsRng, &payload_bytes);
        let signed = SignedRegistration { payload: registration, signature: BASE64.encode(signature.to_bytes()) };

        let response = self
            .http
            .post(format!("{}/api/v1/services", self.gateway_url))
            .json(&signed)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(HoneycombError::claims_invalid(format!(
                "registration rejected with status {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Idempotent: the first call fetches `/api/v1/profiles` and rebuilds
    /// the route table atomically; concurrent first callers are deduped by
    /// `OnceCell`; later calls return the cached info. Never fails, a
    /// fetch failure yields a stale `SyncInfo`.
    pub async fn ready(&self) -> SyncInfo {
        self.sync
            .get_or_init(|| async { self.fetch_profiles().await })
            .await
            .clone()
    }

    async fn fetch_profiles(&self) -> SyncInfo {
        let url = format!("{}/api/v1/profiles", self.gateway_url);
        let fetched = async {
            let response = self.http.get(&url).send().await?;
            response.json::<Vec<ServiceProfile>>().await
        }
        .await;

        match fetched {
            Ok(profiles) => {
                let mut routes = self.routes.lock().await;
                routes.clear();
                for profile in &profiles {
                    routes.insert(profile.name.clone(), profile.clone());
                }
                SyncInfo::fresh(&profiles)
            }
            Err(err) => {
                warn!(%err, "profile sync failed, route table left empty");
                SyncInfo::stale()
            }
        }
    }

    pub fn service<'a>(&'a self, name: &str) -> ServiceHandle<'a> {
        ServiceHandle { client: self, service: name.to_string() }
    }

    /// Primary dispatch entry point: a single `invoke(service, method,
    /// params)` call against the cached route table.
    pub async fn invoke(&self, service: &str, method: &str, params: serde_json::Value) -> ResultEnvelope {
        let profile = {
            let routes = self.routes.lock().await;
            routes.get(service).cloned()
        };

        let Some(profile) = profile else {
            return ResultEnvelope::failure(
                service,
                method,
                Source::Sdk,
                ErrorCode::RouteNotFound,
                format!("unknown service '{service}'"),
                true,
            );
        };

        let Some(api_method) = profile.api.methods.iter().find(|m| m.name == method) else {
            return ResultEnvelope::failure(
                service,
                method,
                Source::Sdk,
                ErrorCode::MethodNotFound,
                format!("service '{service}' exposes no method '{method}'"),
                false,
            );
        };

        if profile.instances.is_empty() {
            return ResultEnvelope::failure(
                service,
                method,
                Source::Sdk,
                ErrorCode::RouteNotFound,
                format!("no live instances for service '{service}'"),
                true,
            );
        }

        for instance in &profile.instances {
            match dispatch::call_instance(&self.http, service, method, &params, instance).await {
                Ok(result) => return ResultEnvelope::success(service, method, Source::Service, result),
                Err(failure) => {
                    if !api_method.retryable {
                        return ResultEnvelope::failure(service, method, Source::Sdk, failure.code, failure.message, false);
                    }
                    if let Some(delay) = failure.retry_after {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        ResultEnvelope::failure(
            service,
            method,
            Source::Sdk,
            ErrorCode::AllInstancesFailed,
            format!("every instance of '{service}' failed"),
            true,
        )
    }
}

/// Thin per-service sugar over [`Honeycomb::invoke`].
pub struct ServiceHandle<'a> {
    client: &'a Honeycomb,
    service: String,
}

impl<'a> ServiceHandle<'a> {
    pub async fn call(&self, method: &str, params: serde_json::Value) -> ResultEnvelope {
        self.client.invoke(&self.service, method, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invoke_before_ready_yields_route_not_found() {
        let client = Honeycomb::new("http://127.0.0.1:1").unwrap();
        let envelope = client.invoke("NOOPService", "hello", serde_json::json!({"receiver": "host"})).await;
        assert!(envelope.has_error);
        assert_eq!(envelope.error.unwrap().code, ErrorCode::RouteNotFound);
    }

    #[tokio::test]
    async fn invoke_unknown_method_yields_method_not_found() {
        let client = Honeycomb::new("http://127.0.0.1:1").unwrap();
        {
            let mut routes = client.routes.lock().await;
            routes.insert(
                "NOOPService".to_string(),
                ServiceProfile {
                    name: "NOOPService".to_string(),
                    version: "0.0.1".to_string(),
                    depends_on: vec![],
                    ports: vec![],
                    api: honeycomb_common::ApiDescriptor { description: String::new(), methods: vec![] },
                    instances: vec![],
                },
            );
        }
        let envelope = client.invoke("NOOPService", "hello", serde_json::json!({})).await;
        assert!(envelope.has_error);
        assert_eq!(envelope.error.unwrap().code, ErrorCode::MethodNotFound);
    }
}
