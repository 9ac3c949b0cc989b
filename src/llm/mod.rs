pub mod client;
#[cfg(feature = "ollama")]
pub mod ollama;

pub use client::{InferenceBackend, InferenceProvider};
#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;
