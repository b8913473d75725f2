use honeycomb_common::{CertificatePayload, HoneycombError, RegistrationPayload};
use serde_json::json;

/// Builds a JSON Schema from the certificate's claim body, one `const`
/// assertion per top-level claim field, and validates the registration
/// request against it. Any discrepancy (e.g. a `version` bump between the
/// certificate request and the later registration) fails validation.
pub fn validate_claims(cert: &CertificatePayload, registration: &RegistrationPayload) -> Result<(), HoneycombError> {
    let schema = json!({
        "type": "object",
        "properties": {
            "app": { "const": cert.app },
            "service": { "const": serde_json::to_value(&cert.service)? },
        },
        "required": ["app", "service"],
    });

    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| HoneycombError::claims_invalid(format!("internal schema build failure: {e}")))?;

    let instance = json!({
        "app": registration.app,
        "service": serde_json::to_value(&registration.service)?,
    });

    if validator.is_valid(&instance) {
        Ok(())
    } else {
        let detail = validator
            .iter_errors(&instance)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(HoneycombError::claims_invalid(format!(
            "registration claims do not match the issuing certificate: {detail}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use honeycomb_common::{ApiDescriptor, NetworkDescriptor, ServiceManifest};

    fn manifest(version: &str) -> ServiceManifest {
        ServiceManifest {
            name: "NOOPService".to_string(),
            version: version.to_string(),
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

    fn cert_payload(version: &str) -> CertificatePayload {
        CertificatePayload {
            app: "current.ly".to_string(),
            service: manifest(version),
            public_key: "k".to_string(),
            metadata: honeycomb_common::CertificateMetadata {
                deployment_id: uuid::Uuid::new_v4(),
                certificate_id: uuid::Uuid::new_v4(),
                instance_id: "ca-1".to_string(),
                issued_at: 0,
                expires_at: 0,
            },
        }
    }

    #[test]
    fn matching_claims_pass() {
        let cert = cert_payload("0.0.1");
        let registration = RegistrationPayload {
            app: "current.ly".to_string(),
            service: manifest("0.0.1"),
            certificate: String::new(),
        };
        assert!(validate_claims(&cert.clone(), &registration).is_ok());
    }

    #[test]
    fn tampered_version_fails() {
        let cert = cert_payload("0.0.1");
        let registration = RegistrationPayload {
            app: "current.ly".to_string(),
            service: manifest("0.0.2"),
            certificate: String::new(),
        };
        assert!(validate_claims(&cert, &registration).is_err());
    }
}
