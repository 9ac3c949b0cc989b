use crate::llm::client::{parse_base_url, InferenceBackend};
use crate::types::{AppError, MessageRole, PromptMessage, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};

pub struct OllamaBackend {
    client: Ollama,
    model: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, model: String) -> Result<Self> {
        let (scheme, host, port) = parse_base_url(base_url)?;
        let client = Ollama::new(format!("{}://{}", scheme, host), port);

        tracing::debug!(%host, port, %model, "Configured Ollama backend");
        Ok(Self { client, model })
    }
}

fn to_chat_message(message: &PromptMessage) -> ChatMessage {
    match message.role {
        MessageRole::System => ChatMessage::system(message.content.clone()),
        MessageRole::User => ChatMessage::user(message.content.clone()),
        MessageRole::Assistant => ChatMessage::assistant(message.content.clone()),
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    /// `max_tokens` is not forwarded; Ollama applies the model's own limit.
    async fn complete(&self, messages: &[PromptMessage], max_tokens: u32) -> Result<String> {
        let chat_messages: Vec<ChatMessage> = messages.iter().map(to_chat_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), chat_messages);

        tracing::trace!(model = %self.model, messages = messages.len(), max_tokens, "Sending chat request");

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
