//! Client-hosted sampling.
//!
//! The server asks the client for an LLM completion via
//! `sampling/createMessage`; the client answers through its
//! [`SamplingHandler`]. [`ChatSamplingHandler`] bridges the MCP request
//! shape to a plain chat backend.

use async_trait::async_trait;
use mcplex_core::McpResult;
use mcplex_protocol::{
    Content, CreateMessageParams, CreateMessageResult, Role, StopReason,
};
use tokio_util::sync::CancellationToken;

/// Handler for server-initiated sampling requests.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    /// Produces a completion for the given conversation.
    ///
    /// The token is cancelled if the server cancels the request; handlers
    /// doing long work should observe it.
    async fn create_message(
        &self,
        params: CreateMessageParams,
        token: CancellationToken,
    ) -> McpResult<CreateMessageResult>;
}

/// A plain-text chat message, the backend's native part.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub text: String,
}

/// A request in the backend's shape.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// System prompt, if any.
    pub system: Option<String>,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Stop sequences.
    pub stop_sequences: Vec<String>,
}

/// A completion from the backend.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Model that produced the completion.
    pub model: String,
    /// Completion text.
    pub text: String,
}

/// A chat completion backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Produces a completion for the request.
    async fn complete(&self, request: ChatRequest) -> McpResult<ChatResponse>;
}

/// Adapter from MCP sampling requests to a [`ChatBackend`].
///
/// Maps inbound [`Content`] variants to the backend's text parts and the
/// backend's completion back to an MCP result with stop reason `endTurn`.
pub struct ChatSamplingHandler<B> {
    backend: B,
}

impl<B: ChatBackend> ChatSamplingHandler<B> {
    /// Wraps a backend as a sampling handler.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

/// Maps MCP content to the backend's text part.
///
/// Non-text content without a textual rendering passes through as text
/// with an empty body.
fn content_text(content: &Content) -> String {
    match content {
        Content::Text { text } => text.clone(),
        Content::Resource { resource } => resource.as_text().unwrap_or_default().to_string(),
        Content::Image { .. } => String::new(),
    }
}

#[async_trait]
impl<B: ChatBackend> SamplingHandler for ChatSamplingHandler<B> {
    async fn create_message(
        &self,
        params: CreateMessageParams,
        _token: CancellationToken,
    ) -> McpResult<CreateMessageResult> {
        let request = ChatRequest {
            system: params.system_prompt,
            messages: params
                .messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role,
                    text: content_text(&m.content),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop_sequences: params.stop_sequences,
        };

        let response = self.backend.complete(request).await?;
        Ok(CreateMessageResult {
            role: Role::Assistant,
            content: Content::text(response.text),
            model: response.model,
            stop_reason: StopReason::EndTurn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::{ResourceContents, SamplingMessage};

    struct EchoBackend;

    #[async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: ChatRequest) -> McpResult<ChatResponse> {
            let text = request
                .messages
                .iter()
                .map(|m| m.text.as_str())
                .collect::<Vec<_>>()
                .join("|");
            Ok(ChatResponse {
                model: "echo-1".to_string(),
                text,
            })
        }
    }

    #[tokio::test]
    async fn test_text_messages_map_to_parts() {
        let handler = ChatSamplingHandler::new(EchoBackend);
        let params = CreateMessageParams::new(
            vec![
                SamplingMessage::user("hello"),
                SamplingMessage::assistant("hi"),
            ],
            64,
        );
        let result = handler
            .create_message(params, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.content.as_text(), Some("hello|hi"));
        assert_eq!(result.model, "echo-1");
        assert_eq!(result.stop_reason, StopReason::EndTurn);
        assert!(matches!(result.role, Role::Assistant));
    }

    #[tokio::test]
    async fn test_non_text_content_becomes_empty_text() {
        let handler = ChatSamplingHandler::new(EchoBackend);
        let params = CreateMessageParams::new(
            vec![
                SamplingMessage {
                    role: Role::User,
                    content: Content::Image {
                        data: "aGk=".to_string(),
                        mime_type: "image/png".to_string(),
                    },
                },
                SamplingMessage {
                    role: Role::User,
                    content: Content::Resource {
                        resource: ResourceContents::text("file:///notes.txt", "notes"),
                    },
                },
            ],
            64,
        );
        let result = handler
            .create_message(params, CancellationToken::new())
            .await
            .unwrap();

        // Image has no textual rendering; the resource contributes its text
        assert_eq!(result.content.as_text(), Some("|notes"));
    }
}
