//! Vault transit encrypt/decrypt.
//!
//! Plaintext travels base64-encoded in both directions; the transit engine
//! never sees raw bytes.

use crate::config::VaultConfig;
use crate::error::{FlowTestError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use tracing::debug;

/// Client for one transit key.
pub struct VaultTransit {
    agent: ureq::Agent,
    url: String,
    transit_path: String,
    key_name: String,
    token: String,
}

impl VaultTransit {
    /// Builds a client from the `[vault]` section.
    ///
    /// `url`, `key_name` and `token` must all be set.
    pub fn from_config(config: &VaultConfig) -> Result<Self> {
        let missing = |field: &str| FlowTestError::Config(format!("[vault] {} is not set", field));
        let url = config.url.clone().ok_or_else(|| missing("url"))?;
        let key_name = config.key_name.clone().ok_or_else(|| missing("key_name"))?;
        let token = config.token.clone().ok_or_else(|| missing("token"))?;

        Ok(Self {
            agent: ureq::Agent::new_with_defaults(),
            url: url.trim_end_matches('/').to_string(),
            transit_path: config.transit_path.trim_matches('/').to_string(),
            key_name,
            token,
        })
    }

    /// Encrypts `plaintext`, returning the `vault:v1:...` ciphertext.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let body = json!({ "plaintext": BASE64.encode(plaintext.as_bytes()) });
        let response = self.post("encrypt", &body)?;
        data_field(&response, "ciphertext")
    }

    /// Decrypts a transit ciphertext.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let body = json!({ "ciphertext": ciphertext });
        let response = self.post("decrypt", &body)?;
        decode_plaintext(&data_field(&response, "plaintext")?)
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/{}/{}/{}",
            self.url, self.transit_path, operation, self.key_name
        )
    }

    fn post(&self, operation: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(operation);
        debug!(url = url.as_str(), "Vault transit request");
        self.agent
            .post(&url)
            .header("X-Vault-Token", &self.token)
            .send_json(body)
            .map_err(|e| FlowTestError::Secret(format!("{} failed: {}", operation, e)))?
            .into_body()
            .read_json::<Value>()
            .map_err(|e| FlowTestError::Secret(format!("{} response: {}", operation, e)))
    }
}

fn data_field(response: &Value, field: &str) -> Result<String> {
    response
        .pointer(&format!("/data/{}", field))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| FlowTestError::Secret(format!("response has no data.{}", field)))
}

fn decode_plaintext(encoded: &str) -> Result<String> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| FlowTestError::Secret(format!("plaintext is not base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| FlowTestError::Secret(format!("plaintext is not UTF-8: {}", e)))
}
