#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # MediaGen Core
//!
//! Asynchronous generation-task orchestration: submits prompts to
//! third-party AI media-generation providers, tracks each task through its
//! lifecycle via polling and signed webhook callbacks, and normalizes every
//! provider's response shape into one unified task model.
//!
//! ## Architecture
//!
//! ```text
//! GenerationRequest -> GenerationService -> ProviderRegistry -> adapter HTTP call
//!                            |                                        |
//!                      TaskStore (external)  <---- normalized TaskSnapshot
//!                            ^
//!        webhook POST -> handle_callback (CallbackSigner verification)
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - The `GenerationTask` record, unified status enum and
//!   status normalization
//! - [`providers`] - One adapter per vendor behind the
//!   `GenerationProvider` capability trait
//! - [`registry`] - Lazy, memoized adapter construction per provider tag
//! - [`signing`] - HMAC-signed callback URLs with a bounded validity window
//! - [`orchestration`] - The `GenerationService` entry point
//! - [`persistence`] - The `TaskStore` contract plus an in-memory provider
//! - [`config`] - Environment-driven configuration
//!
//! ## Lifecycle invariant
//!
//! `completed` and `failed` are terminal. Once a stored task is terminal,
//! later status reports - from a late webhook or a racing poll - are logged
//! and discarded via the store's conditional update, never applied.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mediagen_core::config::MediaGenConfig;
//! use mediagen_core::models::{GenerationRequest, MediaType};
//! use mediagen_core::orchestration::GenerationService;
//! use mediagen_core::persistence::MemoryTaskStore;
//! use mediagen_core::registry::ProviderRegistry;
//! use mediagen_core::signing::CallbackSigner;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(MediaGenConfig::from_env()?);
//! let signer = CallbackSigner::new(config.callback_base_url.clone(), &config.callback_secret);
//! let registry = Arc::new(ProviderRegistry::new(Arc::clone(&config)));
//! let service = GenerationService::new(registry, signer, Arc::new(MemoryTaskStore::new()));
//!
//! let task = service
//!     .submit(GenerationRequest::new("a lighthouse at dusk", MediaType::Image))
//!     .await?;
//! println!("submitted {} as {}", task.id, task.provider_task_id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod persistence;
pub mod providers;
pub mod registry;
pub mod signing;

#[doc(hidden)]
pub mod test_helpers;

pub use config::MediaGenConfig;
pub use errors::{
    OrchestrationError, OrchestrationResult, ProviderError, SignatureError, StoreError,
};
pub use models::{GenerationRequest, GenerationStatus, GenerationTask, MediaType};
pub use orchestration::{CompletionListener, GenerationService, NoopListener};
pub use persistence::{MemoryTaskStore, TaskStore};
pub use providers::{GenerationProvider, ProviderKind, TaskSnapshot};
pub use registry::ProviderRegistry;
pub use signing::{CallbackSigner, SignedCallback};
