//! Method name constants for the MCP method set.

/// Lifecycle: `initialize` request.
pub const INITIALIZE: &str = "initialize";
/// Lifecycle: `notifications/initialized` notification.
pub const INITIALIZED: &str = "notifications/initialized";
/// Lifecycle: `ping` request.
pub const PING: &str = "ping";

/// `tools/list` request.
pub const TOOLS_LIST: &str = "tools/list";
/// `tools/call` request.
pub const TOOLS_CALL: &str = "tools/call";
/// `notifications/tools/list_changed` notification.
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";

/// `prompts/list` request.
pub const PROMPTS_LIST: &str = "prompts/list";
/// `prompts/get` request.
pub const PROMPTS_GET: &str = "prompts/get";
/// `notifications/prompts/list_changed` notification.
pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";

/// `resources/list` request.
pub const RESOURCES_LIST: &str = "resources/list";
/// `resources/read` request.
pub const RESOURCES_READ: &str = "resources/read";
/// `resources/templates/list` request.
pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
/// `resources/subscribe` request.
pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
/// `resources/unsubscribe` request.
pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
/// `notifications/resources/updated` notification.
pub const RESOURCES_UPDATED: &str = "notifications/resources/updated";
/// `notifications/resources/list_changed` notification.
pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";

/// `completion/complete` request.
pub const COMPLETION_COMPLETE: &str = "completion/complete";

/// `logging/setLevel` request.
pub const LOGGING_SET_LEVEL: &str = "logging/setLevel";
/// `notifications/message` notification.
pub const LOGGING_MESSAGE: &str = "notifications/message";

/// `sampling/createMessage` request.
pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";

/// `roots/list` request.
pub const ROOTS_LIST: &str = "roots/list";
/// `notifications/roots/list_changed` notification.
pub const ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";

/// `notifications/progress` notification.
pub const PROGRESS: &str = "notifications/progress";
/// `notifications/cancelled` notification.
pub const CANCELLED: &str = "notifications/cancelled";
