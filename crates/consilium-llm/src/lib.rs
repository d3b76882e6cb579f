//! Consilium-LLM: text-generation backends
//!
//! This crate provides the `generate(prompt, temperature, mode)` collaborator
//! used by every Consilium specialist.
//!
//! ## Key Components
//!
//! - `TextGenerator`: the async generation contract
//! - `OllamaClient`: local backend (`GenerationMode::Local`)
//! - `TogetherClient`: hosted chat-completions backend (`GenerationMode::External`)
//! - `GenerationRouter`: picks the backend from the request mode
//! - `fakes`: scripted in-memory generators for tests

mod error;
pub mod fakes;
mod generator;
pub mod ollama;
mod router;
pub mod together;

pub use error::GenerationError;
pub use generator::{GenerationMode, GenerationRequest, TextGenerator};
pub use ollama::{OllamaClient, OllamaConfig, DEFAULT_LOCAL_MODEL};
pub use router::GenerationRouter;
pub use together::{TogetherClient, TogetherConfig, DEFAULT_EXTERNAL_MODEL};

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, GenerationError>;
