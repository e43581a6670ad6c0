//! # Callback URL Signing
//!
//! Signs and verifies webhook callback URLs with a shared secret and a
//! bounded validity window, so that a provider-originated callback cannot be
//! forged or replayed outside the window.
//!
//! The signature is `HMAC-SHA256(secret, "{task_id}:{timestamp}")` encoded
//! as lowercase hex. Signed URLs carry three provider-agnostic query
//! parameters: the task id, a Unix-seconds timestamp, and the signature.
//!
//! Verification is a pure computation with no side effects; failures are
//! reported as [`SignatureError`] values, never as faults. Comparison uses
//! the HMAC `verify_slice` primitive, which is constant-time.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::constants::{callback_params, CALLBACK_SIGNATURE_WINDOW_SECS};
use crate::errors::{SignatureError, SignatureResult};

type HmacSha256 = Hmac<Sha256>;

/// A signed callback URL plus its components, ready to embed in a provider
/// task-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCallback {
    /// Full callback URL with `task_id`, `ts` and `sig` query parameters.
    pub url: String,
    /// Unix timestamp (seconds) the signature was generated at.
    pub timestamp: u64,
    /// Lowercase hex HMAC-SHA256 signature.
    pub signature: String,
}

/// Signs and verifies callback URLs for generation tasks.
///
/// The shared secret is process-wide configuration with no runtime mutation;
/// cloning the signer is cheap and thread-safe.
#[derive(Clone)]
pub struct CallbackSigner {
    base_url: String,
    secret: Vec<u8>,
    window_secs: u64,
}

impl std::fmt::Debug for CallbackSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSigner")
            .field("base_url", &self.base_url)
            .field("window_secs", &self.window_secs)
            .finish_non_exhaustive()
    }
}

impl CallbackSigner {
    /// Create a signer for the given callback endpoint and shared secret,
    /// using the canonical validity window.
    pub fn new(base_url: impl Into<String>, secret: impl AsRef<[u8]>) -> Self {
        Self::with_window(base_url, secret, CALLBACK_SIGNATURE_WINDOW_SECS)
    }

    /// Create a signer with an explicit validity window in seconds.
    pub fn with_window(
        base_url: impl Into<String>,
        secret: impl AsRef<[u8]>,
        window_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            secret: secret.as_ref().to_vec(),
            window_secs,
        }
    }

    /// The validity window in seconds.
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Sign a callback URL for the given task id at the current time.
    pub fn sign(&self, task_id: &str) -> SignedCallback {
        self.sign_at(task_id, unix_ts_seconds())
    }

    /// Sign at an explicit timestamp. Exposed for tests exercising the
    /// expiry boundary.
    pub fn sign_at(&self, task_id: &str, timestamp: u64) -> SignedCallback {
        let signature = self.compute_signature(task_id, timestamp);
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}{}={}&{}={}&{}={}",
            self.base_url,
            separator,
            callback_params::TASK_ID,
            task_id,
            callback_params::TIMESTAMP,
            timestamp,
            callback_params::SIGNATURE,
            signature,
        );

        SignedCallback {
            url,
            timestamp,
            signature,
        }
    }

    /// Verify a callback's task id, timestamp and signature against the
    /// shared secret and the validity window.
    pub fn verify(&self, task_id: &str, timestamp: &str, signature: &str) -> SignatureResult<()> {
        self.verify_at(task_id, timestamp, signature, unix_ts_seconds())
    }

    /// Verify against an explicit "now". Exposed for tests.
    pub fn verify_at(
        &self,
        task_id: &str,
        timestamp: &str,
        signature: &str,
        now: u64,
    ) -> SignatureResult<()> {
        let ts: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::TimestampMalformed)?;

        let age_secs = now as i64 - ts;
        if age_secs > self.window_secs as i64 {
            return Err(SignatureError::Expired {
                age_secs,
                window_secs: self.window_secs,
            });
        }

        // Hex-decode the supplied signature; anything that is not valid hex
        // of the right length cannot match.
        let supplied = hex::decode(signature).map_err(|_| SignatureError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| SignatureError::InvalidSignature)?;
        mac.update(signing_payload(task_id, ts as u64).as_bytes());
        mac.verify_slice(&supplied)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    fn compute_signature(&self, task_id: &str, timestamp: u64) -> String {
        // new_from_slice only fails for invalid key lengths; HMAC accepts
        // keys of any length.
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"));
        mac.update(signing_payload(task_id, timestamp).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn signing_payload(task_id: &str, timestamp: u64) -> String {
    format!("{task_id}:{timestamp}")
}

fn unix_ts_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
