//! Observable primitive collections.
//!
//! A [`PrimitiveCollection`] is a name-keyed registry of tools or prompts
//! that emits a `Changed` event on insert and remove. The server wires
//! those events to `notifications/*/list_changed` once the client has
//! confirmed initialization.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use mcplex_core::McpResult;
use mcplex_endpoint::{BoxFuture, RequestContext};
use mcplex_protocol::{CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Prompt, Tool};
use serde_json::Value;

/// A named unit the server exposes to the client.
pub trait Primitive: Send + Sync + 'static {
    /// The unique name within its kind.
    fn name(&self) -> &str;
}

/// A tool: protocol descriptor plus invoke function.
pub struct ServerTool {
    descriptor: Tool,
    invoke: Arc<
        dyn Fn(RequestContext, Option<Value>) -> BoxFuture<'static, McpResult<CallToolResult>>
            + Send
            + Sync,
    >,
}

impl ServerTool {
    /// Creates a tool from its descriptor and invoke function.
    pub fn new<F, Fut>(descriptor: Tool, invoke: F) -> Self
    where
        F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<CallToolResult>> + Send + 'static,
    {
        let invoke = Arc::new(invoke);
        Self {
            descriptor,
            invoke: Arc::new(move |ctx, args| Box::pin(invoke(ctx, args))),
        }
    }

    /// Returns the protocol descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Tool {
        &self.descriptor
    }

    /// Invokes the tool.
    ///
    /// # Errors
    ///
    /// Propagates the invoke function's error.
    pub async fn invoke(
        &self,
        ctx: RequestContext,
        params: CallToolParams,
    ) -> McpResult<CallToolResult> {
        (self.invoke)(ctx, params.arguments).await
    }
}

impl Primitive for ServerTool {
    fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for ServerTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTool")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// A prompt: protocol descriptor plus get function.
pub struct ServerPrompt {
    descriptor: Prompt,
    get: Arc<
        dyn Fn(RequestContext, GetPromptParams) -> BoxFuture<'static, McpResult<GetPromptResult>>
            + Send
            + Sync,
    >,
}

impl ServerPrompt {
    /// Creates a prompt from its descriptor and get function.
    pub fn new<F, Fut>(descriptor: Prompt, get: F) -> Self
    where
        F: Fn(RequestContext, GetPromptParams) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = McpResult<GetPromptResult>> + Send + 'static,
    {
        let get = Arc::new(get);
        Self {
            descriptor,
            get: Arc::new(move |ctx, params| Box::pin(get(ctx, params))),
        }
    }

    /// Returns the protocol descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &Prompt {
        &self.descriptor
    }

    /// Renders the prompt.
    ///
    /// # Errors
    ///
    /// Propagates the get function's error.
    pub async fn get(
        &self,
        ctx: RequestContext,
        params: GetPromptParams,
    ) -> McpResult<GetPromptResult> {
        (self.get)(ctx, params).await
    }
}

impl Primitive for ServerPrompt {
    fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for ServerPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPrompt")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

type Subscriber = Arc<dyn Fn() + Send + Sync>;

struct CollectionInner<T> {
    items: HashMap<String, Arc<T>>,
    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
}

/// Name-keyed, observable registry of primitives.
///
/// Cheap to clone; clones share the registry. Subscribers are invoked
/// synchronously under the mutation lock and must not block.
pub struct PrimitiveCollection<T> {
    inner: Arc<Mutex<CollectionInner<T>>>,
}

impl<T> Clone for PrimitiveCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Primitive> Default for PrimitiveCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Primitive> PrimitiveCollection<T> {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CollectionInner {
                items: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
            })),
        }
    }

    /// Inserts a primitive, replacing any existing item of the same name.
    ///
    /// Emits `Changed`.
    pub fn insert(&self, item: T) {
        let mut inner = self.inner.lock().expect("collection lock poisoned");
        inner.items.insert(item.name().to_string(), Arc::new(item));
        notify(&inner);
    }

    /// Removes a primitive by name, returning it if present.
    ///
    /// Emits `Changed` when something was removed.
    pub fn remove(&self, name: &str) -> Option<Arc<T>> {
        let mut inner = self.inner.lock().expect("collection lock poisoned");
        let removed = inner.items.remove(name);
        if removed.is_some() {
            notify(&inner);
        }
        removed
    }

    /// Looks up a primitive by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.inner
            .lock()
            .expect("collection lock poisoned")
            .items
            .get(name)
            .cloned()
    }

    /// Returns all items.
    #[must_use]
    pub fn items(&self) -> Vec<Arc<T>> {
        self.inner
            .lock()
            .expect("collection lock poisoned")
            .items
            .values()
            .cloned()
            .collect()
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("collection lock poisoned")
            .items
            .len()
    }

    /// Returns true if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to `Changed` events.
    ///
    /// The callback runs synchronously under the collection's mutation
    /// lock; it must be non-blocking. Dropping the returned
    /// [`Subscription`] unsubscribes.
    #[must_use]
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription<T> {
        let mut inner = self.inner.lock().expect("collection lock poisoned");
        let id = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.insert(id, Arc::new(callback));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }
}

fn notify<T>(inner: &CollectionInner<T>) {
    for subscriber in inner.subscribers.values() {
        subscriber();
    }
}

/// Disposer for a collection subscription.
pub struct Subscription<T> {
    inner: Weak<Mutex<CollectionInner<T>>>,
    id: u64,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .lock()
                .expect("collection lock poisoned")
                .subscribers
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tool(name: &str) -> ServerTool {
        ServerTool::new(
            Tool::new(name, serde_json::json!({"type": "object"})),
            |_ctx, _args| async move {
                Ok(CallToolResult {
                    content: vec![],
                    is_error: false,
                })
            },
        )
    }

    #[test]
    fn test_insert_get_remove() {
        let collection = PrimitiveCollection::new();
        collection.insert(tool("a"));
        collection.insert(tool("b"));

        assert_eq!(collection.len(), 2);
        assert!(collection.get("a").is_some());
        assert!(collection.get("missing").is_none());

        assert!(collection.remove("a").is_some());
        assert!(collection.remove("a").is_none());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_insert_replaces_same_name() {
        let collection = PrimitiveCollection::new();
        collection.insert(tool("a"));
        collection.insert(tool("a"));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn test_changed_events() {
        let collection = PrimitiveCollection::new();
        let events = Arc::new(AtomicUsize::new(0));

        let subscription = {
            let events = Arc::clone(&events);
            collection.subscribe(move || {
                events.fetch_add(1, Ordering::SeqCst);
            })
        };

        collection.insert(tool("a"));
        collection.remove("a");
        // Removing a missing name emits nothing
        collection.remove("a");
        assert_eq!(events.load(Ordering::SeqCst), 2);

        drop(subscription);
        collection.insert(tool("b"));
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_items() {
        let collection = PrimitiveCollection::new();
        let other = collection.clone();
        collection.insert(tool("shared"));
        assert!(other.get("shared").is_some());
    }
}
