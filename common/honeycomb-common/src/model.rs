use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An envelope pairs a signed payload with its base64-encoded signature.
///
/// Every cryptographic artifact in Honeycomb (certificates, registrations)
/// uses this shape: the signature always covers the UTF-8 JSON encoding of
/// `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub payload: T,
    pub signature: String,
}

/// The declarative description of a service (identity, API, network).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    pub api: ApiDescriptor,
    pub network: NetworkDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    #[serde(default)]
    pub description: String,
    pub methods: Vec<ApiMethod>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMethod {
    pub name: String,
    pub params: serde_json::Value,
    /// Whether the SDK dispatcher may fail over to the next instance when
    /// this method errors. Defaults to `false` (fail fast) when absent.
    #[serde(default)]
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    #[serde(default)]
    pub internal_only: bool,
    #[serde(default)]
    pub public_host_name: String,
    pub rpc_endpoint: String,
}

/// The claims a requesting service presents to the Certificate Authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateRequestPayload {
    pub app: String,
    pub service: ServiceManifest,
    /// Base64-encoded public key of the requesting instance.
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub deployment_id: Uuid,
    pub certificate_id: Uuid,
    pub instance_id: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// The signed payload embedded in a [`ServiceCertificate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificatePayload {
    pub app: String,
    pub service: ServiceManifest,
    pub public_key: String,
    pub metadata: CertificateMetadata,
}

pub type ServiceCertificate = Envelope<CertificatePayload>;

/// The payload a service signs and submits to the Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub app: String,
    pub service: ServiceManifest,
    /// Base64-encoded JSON of the issuing certificate envelope.
    pub certificate: String,
}

pub type SignedRegistration = Envelope<RegistrationPayload>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    pub receipt_id: Uuid,
    pub service_id: Uuid,
    pub app: String,
    pub service_name: String,
    pub alias: String,
    pub callback_url: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub instance_id: String,
    pub instance_public_key: String,
    pub certificate_sha256: String,
    pub nonce: String,
    pub urn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub created_at: i64,
    pub rpc_endpoint: String,
    pub urn: String,
}

/// Derived, read-only aggregation of receipt-backed instances for one
/// service name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProfile {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    pub api: ApiDescriptor,
    pub instances: Vec<ServiceInstance>,
}

/// Two-state SDK sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Fresh,
    Stale,
}

/// The document persisted (and change-fed) by the Registry: the verbatim
/// claims alongside the receipt they produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDocument {
    pub claims: ServiceManifest,
    pub receipt: RegistrationReceipt,
}

/// A change-feed event published by the Registry over the durable store's
/// change-stream capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    Upserted(Box<ReceiptDocument>),
    Deleted { service_name: String, receipt_id: Uuid },
}
