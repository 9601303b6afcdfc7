//! Client-hosted roots.

use std::sync::Mutex;

use async_trait::async_trait;
use mcplex_core::McpResult;
use mcplex_protocol::Root;

/// Handler for server-initiated `roots/list` requests.
#[async_trait]
pub trait RootsHandler: Send + Sync {
    /// Returns the client's current roots.
    async fn list_roots(&self) -> McpResult<Vec<Root>>;
}

/// A fixed, mutable set of roots.
#[derive(Debug, Default)]
pub struct StaticRoots {
    roots: Mutex<Vec<Root>>,
}

impl StaticRoots {
    /// Creates a root set from the given roots.
    #[must_use]
    pub fn new(roots: Vec<Root>) -> Self {
        Self {
            roots: Mutex::new(roots),
        }
    }

    /// Replaces the root set.
    ///
    /// Callers should follow up with
    /// [`Client::notify_roots_list_changed`](crate::Client::notify_roots_list_changed).
    pub fn replace(&self, roots: Vec<Root>) {
        *self.roots.lock().expect("roots lock poisoned") = roots;
    }
}

#[async_trait]
impl RootsHandler for StaticRoots {
    async fn list_roots(&self) -> McpResult<Vec<Root>> {
        Ok(self.roots.lock().expect("roots lock poisoned").clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_roots_replace() {
        let roots = StaticRoots::new(vec![Root {
            uri: "file:///a".to_string(),
            name: None,
        }]);
        assert_eq!(roots.list_roots().await.unwrap().len(), 1);

        roots.replace(vec![
            Root {
                uri: "file:///a".to_string(),
                name: None,
            },
            Root {
                uri: "file:///b".to_string(),
                name: Some("b".to_string()),
            },
        ]);
        assert_eq!(roots.list_roots().await.unwrap().len(), 2);
    }
}
