use base64::engine::{general_purpose, Engine};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_KEY: &str = "X-Cal-Key";
pub const HEADER_TIMESTAMP: &str = "X-Cal-Timestamp";
pub const HEADER_NONCE: &str = "X-Cal-Nonce";
pub const HEADER_SIGNATURE: &str = "X-Cal-Signature";

/// Signs calendar API requests with HMAC-SHA256.
///
/// The canonical request is one field per line:
///
/// ```text
/// METHOD
/// /path?query
/// key id
/// timestamp
/// nonce
/// hex(sha256(body))
/// ```
///
/// and the signature is the base64 of its HMAC under the secret key.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    key_id: String,
    secret_key: String,
}

impl RequestSigner {
    pub fn new(key_id: &str, secret_key: &str) -> Self {
        Self {
            key_id: key_id.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Random 8-digit nonce.
    pub fn generate_nonce() -> String {
        rand::thread_rng().gen_range(10000000..99999999).to_string()
    }

    pub fn canonical_request(
        &self,
        method: &str,
        uri: &str,
        timestamp: i64,
        nonce: &str,
        body: &str,
    ) -> String {
        let body_digest = hex::encode(Sha256::digest(body.as_bytes()));
        [
            method.to_ascii_uppercase(),
            uri.to_string(),
            self.key_id.clone(),
            timestamp.to_string(),
            nonce.to_string(),
            body_digest,
        ]
        .join("\n")
    }

    pub fn sign(&self, method: &str, uri: &str, timestamp: i64, nonce: &str, body: &str) -> String {
        let canonical = self.canonical_request(method, uri, timestamp, nonce, body);
        debug!("Signing {} {} at {}", method, uri, timestamp);

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(canonical.as_bytes());

        general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Authentication headers for one request, with a fresh nonce and timestamp.
    pub fn headers(&self, method: &str, uri: &str, body: &str) -> Vec<(&'static str, String)> {
        let timestamp = Utc::now().timestamp();
        let nonce = Self::generate_nonce();
        let signature = self.sign(method, uri, timestamp, &nonce, body);

        vec![
            (HEADER_KEY, self.key_id.clone()),
            (HEADER_TIMESTAMP, timestamp.to_string()),
            (HEADER_NONCE, nonce),
            (HEADER_SIGNATURE, signature),
        ]
    }
}
