//! Inference backend abstraction
//!
//! Workers and the delegation classifier talk to the language model through
//! [`InferenceBackend`], so the engine never depends on a specific provider.

use crate::types::{AppError, PromptMessage, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Text completion over a chat transcript.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Complete the conversation in `messages`.
    ///
    /// `max_tokens` bounds the reply length where the provider supports it.
    /// Fails with `BackendUnavailable` or `BackendTimeout`.
    async fn complete(&self, messages: &[PromptMessage], max_tokens: u32) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum InferenceProvider {
    /// Local Ollama server
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = InferenceProvider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    /// };
    /// ```
    Ollama { base_url: String, model: String },
}

impl InferenceProvider {
    pub fn create_backend(&self) -> Result<Arc<dyn InferenceBackend>> {
        match self {
            #[cfg(feature = "ollama")]
            InferenceProvider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaBackend::new(base_url, model.clone())?,
            )),
            #[cfg(not(feature = "ollama"))]
            InferenceProvider::Ollama { .. } => Err(AppError::Configuration(
                "Ollama support not compiled in; enable the `ollama` feature".to_string(),
            )),
        }
    }
}

/// Split `scheme://host[:port]` into its parts, defaulting to
/// `http://localhost:11434`.
pub fn parse_base_url(base_url: &str) -> Result<(String, String, u16)> {
    let (scheme, rest) = match base_url.split_once("://") {
        Some((scheme, rest)) => (scheme.to_string(), rest),
        None => ("http".to_string(), base_url),
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                AppError::Configuration(format!("Invalid port in inference URL: {}", base_url))
            })?;
            (host.to_string(), port)
        }
        None => (rest.to_string(), 11434),
    };

    let host = if host.is_empty() {
        "localhost".to_string()
    } else {
        host
    };
    Ok((scheme, host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_parsing_full() {
        let (scheme, host, port) = parse_base_url("http://localhost:11434").unwrap();
        assert_eq!(scheme, "http");
        assert_eq!(host, "localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn test_url_parsing_no_port() {
        let (_, host, port) = parse_base_url("https://gpu-box/").unwrap();
        assert_eq!(host, "gpu-box");
        assert_eq!(port, 11434);
    }

    #[test]
    fn test_url_parsing_bad_port() {
        assert!(matches!(
            parse_base_url("http://localhost:abc"),
            Err(AppError::Configuration(_))
        ));
    }
}
