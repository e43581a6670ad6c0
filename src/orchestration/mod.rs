//! Orchestration layer: the only surface the rest of the application talks
//! to for generation tasks.

pub mod generation_service;

pub use generation_service::{CompletionListener, GenerationService, NoopListener};
