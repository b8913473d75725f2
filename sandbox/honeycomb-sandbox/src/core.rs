use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable utilities available to every module regardless of policy:
/// uuid minting, hashing, an outbound HTTP client, and a logger handle.
#[derive(Clone, Default)]
pub struct Core {
    http: reqwest::Client,
}

impl Core {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    pub fn uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    pub fn hash(&self, bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    pub async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        self.http.get(url).send().await?.text().await
    }

    pub fn logger(&self, module: &str) -> Logger {
        Logger { module: module.to_string() }
    }
}

/// Per-module logging handle, thin wrapper over `tracing` carrying the
/// module name as a span field.
pub struct Logger {
    module: String,
}

impl Logger {
    pub fn info(&self, message: &str) {
        tracing::info!(module = %self.module, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(module = %self.module, "{message}");
    }

    pub fn error(&self, message: &str) {
        tracing::error!(module = %self.module, "{message}");
    }
}
