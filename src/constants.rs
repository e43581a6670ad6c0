//! # System Constants
//!
//! Core constants that define the operational boundaries of the generation
//! orchestration subsystem: callback signing, provider defaults, and HTTP
//! client limits.

/// Validity window for signed webhook callback URLs, in seconds.
///
/// Applied uniformly to all media types. A callback whose timestamp is older
/// than this window is rejected with `SignatureError::Expired`.
pub const CALLBACK_SIGNATURE_WINDOW_SECS: u64 = 3600;

/// Query parameter names carried by signed callback URLs.
///
/// Provider-agnostic: the same three parameters are appended regardless of
/// which vendor will eventually POST to the URL.
pub mod callback_params {
    pub const TASK_ID: &str = "task_id";
    pub const TIMESTAMP: &str = "ts";
    pub const SIGNATURE: &str = "sig";
}

/// Task id prefixes, keyed by media type.
pub mod task_id_prefix {
    pub const IMAGE: &str = "img_";
    pub const VIDEO: &str = "vid_";
}

/// Provider selected when configuration does not name one.
pub const DEFAULT_PROVIDER: &str = "kie";

/// Default timeout applied to every outbound provider HTTP request, in
/// milliseconds. A hanging provider must not block a caller indefinitely.
pub const PROVIDER_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Environment variable prefix for configuration keys.
pub const CONFIG_ENV_PREFIX: &str = "MEDIAGEN";
