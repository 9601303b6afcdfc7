//! Typed params and results for the MCP method surface.
//!
//! Wire field names are camelCase per the protocol; the serde attributes
//! here pin them while the Rust shapes follow how the engine uses them.
//! Optional fields are omitted from the wire rather than sent as `null`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonrpc::RequestId;
use crate::types::{
    ClientCapabilities, Content, Implementation, LogLevel, ModelPreferences, Prompt,
    PromptMessage, Resource, ResourceContents, ResourceTemplate, Role, Root, SamplingMessage,
    ServerCapabilities, StopReason, Tool,
};

// ============================================================================
// Lifecycle
// ============================================================================

/// What the client sends in `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    /// Version the client wants to speak; negotiation is exact-match.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// What the client hosts for the server.
    pub capabilities: ClientCapabilities,
    /// Client identity, captured for the life of the session.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// What the server answers `initialize` with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// Version the server speaks; the client verifies it matches exactly.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    /// What the server offers; gates which methods are routable.
    pub capabilities: ServerCapabilities,
    /// Server identity, captured for the life of the session.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Free-form usage guidance for the client's model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// The `{}` result of ping, subscribe, unsubscribe, and setLevel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyResult {}

// ============================================================================
// Progress tokens
// ============================================================================

/// Opaque token a caller attaches under `_meta.progressToken` so the peer
/// can tie `notifications/progress` back to the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// Integer token.
    Num(i64),
    /// String token.
    Str(String),
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        ProgressToken::Num(n)
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        ProgressToken::Str(s.to_owned())
    }
}

impl From<String> for ProgressToken {
    fn from(s: String) -> Self {
        ProgressToken::Str(s)
    }
}

/// The `_meta` envelope carried by requests that support progress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestMeta {
    /// Token for progress correlation, if the caller wants progress.
    #[serde(rename = "progressToken", skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

// ============================================================================
// Pagination
// ============================================================================

/// Params shared by every paginated list method.
///
/// A lister returns a page plus an optional `nextCursor`; the caller (or
/// the server-side composer) feeds that cursor back here until it comes
/// back absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    /// Where to resume, from the previous page's `nextCursor`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl PageParams {
    /// Params for a page starting at `cursor`.
    #[must_use]
    pub fn at(cursor: Option<String>) -> Self {
        Self { cursor }
    }
}

// ============================================================================
// Tools
// ============================================================================

/// One page of `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Tools on this page.
    pub tools: Vec<Tool>,
    /// Present when another page follows.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `tools/call` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Which tool, by collection name.
    pub name: String,
    /// Arguments, validated against the tool's input schema by the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    /// Progress correlation.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

impl CallToolParams {
    /// A call with arguments and no progress token.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
            meta: None,
        }
    }
}

/// `tools/call` result.
///
/// Domain-level tool failures travel as content with `isError` set, not
/// as JSON-RPC errors; protocol errors (unknown tool, bad params) use the
/// error response instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Output blocks.
    pub content: Vec<Content>,
    /// True when the tool itself failed.
    #[serde(
        rename = "isError",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful single-text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::text(text)],
            is_error: false,
        }
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// One page of `prompts/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    /// Prompts on this page.
    pub prompts: Vec<Prompt>,
    /// Present when another page follows.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `prompts/get` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    /// Which prompt, by collection name.
    pub name: String,
    /// Values for the prompt's declared arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<HashMap<String, String>>,
    /// Progress correlation.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

/// `prompts/get` result: the rendered conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptResult {
    /// What the prompt is for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered turns.
    pub messages: Vec<PromptMessage>,
}

// ============================================================================
// Resources
// ============================================================================

/// One page of `resources/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Resources on this page.
    pub resources: Vec<Resource>,
    /// Present when another page follows.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// `resources/templates/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// The server's resource templates.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<ResourceTemplate>,
}

/// `resources/read` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// Which resource, by URI.
    pub uri: String,
    /// Progress correlation.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

/// `resources/read` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// The resource's contents, one entry per constituent piece.
    pub contents: Vec<ResourceContents>,
}

/// `resources/subscribe` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResourceParams {
    /// URI to watch.
    pub uri: String,
}

/// `resources/unsubscribe` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResourceParams {
    /// URI to stop watching.
    pub uri: String,
}

/// `notifications/resources/updated` params, sent only to sessions
/// subscribed to the URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    /// The URI that changed.
    pub uri: String,
}

// ============================================================================
// Completion
// ============================================================================

/// What a completion request is completing against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompletionReference {
    /// An argument of a named prompt.
    #[serde(rename = "ref/prompt")]
    Prompt {
        /// Prompt name.
        name: String,
    },
    /// A variable of a resource URI template.
    #[serde(rename = "ref/resource")]
    Resource {
        /// Resource URI or template.
        uri: String,
    },
}

/// The argument under completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionArgument {
    /// Argument name.
    pub name: String,
    /// The partial value typed so far.
    pub value: String,
}

/// `completion/complete` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteParams {
    /// What is being completed.
    #[serde(rename = "ref")]
    pub reference: CompletionReference,
    /// The argument and its partial value.
    pub argument: CompletionArgument,
}

/// Candidate values inside a complete result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    /// Candidates, at most 100.
    pub values: Vec<String>,
    /// Total matches, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    /// Whether candidates beyond `values` exist.
    #[serde(rename = "hasMore", skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
}

/// `completion/complete` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteResult {
    /// The candidates.
    pub completion: Completion,
}

impl CompleteResult {
    /// The answer a server gives when no completion handler is configured.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            completion: Completion {
                values: Vec::new(),
                total: Some(0),
                has_more: Some(false),
            },
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

/// `logging/setLevel` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLogLevelParams {
    /// Minimum severity the client wants to receive.
    pub level: LogLevel,
}

/// `notifications/message` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessageParams {
    /// Message severity; suppressed below the client's chosen level.
    pub level: LogLevel,
    /// Which component logged it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// The payload, any JSON.
    pub data: Value,
}

// ============================================================================
// Sampling
// ============================================================================

/// `sampling/createMessage` params: a server asking the client's model
/// for a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageParams {
    /// The conversation so far.
    pub messages: Vec<SamplingMessage>,
    /// Token budget for the completion.
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    /// System prompt, when the server wants one.
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Sequences that end generation early.
    #[serde(
        rename = "stopSequences",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub stop_sequences: Vec<String>,
    /// Soft model-selection hints.
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    /// Opaque provider metadata, passed through.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Progress correlation.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

impl CreateMessageParams {
    /// A request with only the conversation and a token budget set.
    #[must_use]
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            system_prompt: None,
            temperature: None,
            stop_sequences: Vec::new(),
            model_preferences: None,
            metadata: None,
            meta: None,
        }
    }
}

/// `sampling/createMessage` result: the model's turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    /// Always the assistant.
    pub role: Role,
    /// The generated content.
    pub content: Content,
    /// Which model produced it.
    pub model: String,
    /// Why generation stopped; `endTurn` on a normal completion.
    #[serde(rename = "stopReason")]
    pub stop_reason: StopReason,
}

impl CreateMessageResult {
    /// A normal text completion.
    #[must_use]
    pub fn text(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Content::text(text),
            model: model.into(),
            stop_reason: StopReason::EndTurn,
        }
    }
}

// ============================================================================
// Roots
// ============================================================================

/// `roots/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    /// The client's current roots.
    pub roots: Vec<Root>,
}

// ============================================================================
// Progress and cancellation
// ============================================================================

/// `notifications/progress` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressParams {
    /// Token from the originating request's `_meta.progressToken`.
    #[serde(rename = "progressToken")]
    pub progress_token: ProgressToken,
    /// How far along; absolute, or relative to `total` when present.
    pub progress: f64,
    /// Expected end, for determinate progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// What is currently happening.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressParams {
    /// Indeterminate progress.
    #[must_use]
    pub fn new(token: impl Into<ProgressToken>, progress: f64) -> Self {
        Self {
            progress_token: token.into(),
            progress,
            total: None,
            message: None,
        }
    }

    /// Determinate progress out of `total`.
    #[must_use]
    pub fn with_total(token: impl Into<ProgressToken>, progress: f64, total: f64) -> Self {
        Self {
            total: Some(total),
            ..Self::new(token, progress)
        }
    }

    /// Attaches a status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// `notifications/cancelled` params.
///
/// Either peer may send this to abandon an in-flight request it issued;
/// the receiver cancels the matching handler's token. For an id with no
/// in-flight request (late or duplicate) it is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledParams {
    /// Id of the request to abandon.
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    /// Why, for the peer's logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
