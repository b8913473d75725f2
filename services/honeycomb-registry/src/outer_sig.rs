use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use honeycomb_common::{HoneycombError, RegistrationPayload};
use rsa::{
    pkcs8::DecodePublicKey,
    pss::{Signature, VerifyingKey},
    signature::Verifier,
    RsaPublicKey,
};
use sha2::Sha256;

/// Verifies the outer `SignedRegistration` envelope signature against the
/// registering service's own public key, embedded in its certificate, not
/// the CA's. The registration payload is only accepted if it was signed by
/// the same key the service declared when it requested its certificate.
pub fn verify(payload: &RegistrationPayload, signature_b64: &str, declared_public_key_b64: &str) -> Result<(), HoneycombError> {
    let der = BASE64
        .decode(declared_public_key_b64)
        .map_err(|e| HoneycombError::claims_invalid(format!("declared public key is not valid base64: {e}")))?;
    let public_key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| HoneycombError::claims_invalid(format!("declared public key is not a valid SPKI DER key: {e}")))?;
    let verifying_key = VerifyingKey::<Sha256>::new(public_key);

    let bytes = serde_json::to_vec(payload)?;
    let sig_bytes = BASE64
        .decode(signature_b64)
        .map_err(|e| HoneycombError::claims_invalid(format!("registration signature is not valid base64: {e}")))?;
    let signature = Signature::try_from(sig_bytes.as_slice())
        .map_err(|e| HoneycombError::claims_invalid(format!("registration signature is malformed: {e}")))?;

    verifying_key
        .verify(&bytes, &signature)
        .map_err(|_| HoneycombError::claims_invalid("registration envelope signature does not verify under the declared public key"))
}
