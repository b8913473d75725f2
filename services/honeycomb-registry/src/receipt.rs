use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use honeycomb_common::{RegistrationPayload, RegistrationReceipt, ServiceCertificate, EXPIRY_MS};
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use witty_phrase_generator::WPGen;

/// Synthesizes a fresh receipt for an accepted registration. Assumes
/// certificate verification and claim validation have already passed.
/// `instance_id`/`instance_public_key` come from the verified certificate,
/// not the registration payload, since the certificate is the CA-attested
/// source of instance identity.
pub fn synthesize(registration: &RegistrationPayload, cert: &ServiceCertificate, callback_url: String) -> RegistrationReceipt {
    let service_id = Uuid::new_v4();
    let receipt_id = Uuid::new_v4();
    let created_at = honeycomb_common::now_ms();

    let alias = WPGen::new()
        .with_words(2)
        .unwrap_or_default()
        .join("-")
        .to_lowercase();

    let mut nonce_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = hex::encode(nonce_bytes);

    let cert_bytes = BASE64.decode(&registration.certificate).unwrap_or_default();
    let certificate_sha256 = hex::encode(Sha256::digest(&cert_bytes));

    RegistrationReceipt {
        receipt_id,
        service_id,
        app: registration.app.clone(),
        service_name: registration.service.name.clone(),
        alias,
        callback_url,
        created_at,
        expires_at: created_at + EXPIRY_MS,
        instance_id: cert.payload.metadata.instance_id.clone(),
        instance_public_key: cert.payload.public_key.clone(),
        certificate_sha256,
        nonce,
        urn: format!("urn:hcp:hc2:service-registration-receipt:{receipt_id}"),
    }
}
