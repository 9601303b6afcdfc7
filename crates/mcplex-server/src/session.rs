//! Server-side session state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use mcplex_protocol::{ClientCapabilities, Implementation, LogLevel};

/// State of one MCP session, shared between the route handlers and the
/// connection handle.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Set once `initialize` has been accepted.
    initialized: AtomicBool,
    /// Set once `notifications/initialized` arrived and the change
    /// notifier is wired up; guards against double subscription.
    change_notifier_armed: AtomicBool,
    client_info: Mutex<Option<Implementation>>,
    client_capabilities: Mutex<Option<ClientCapabilities>>,
    /// URIs the client subscribed to via `resources/subscribe`.
    subscribed_resources: Mutex<HashSet<String>>,
    /// Minimum level for `notifications/message`, set by `logging/setLevel`.
    log_level: Mutex<Option<LogLevel>>,
}

impl SessionState {
    /// Creates a fresh, uninitialized session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the client identity from `initialize`.
    ///
    /// Returns false if the session was already initialized (duplicate
    /// `initialize`), leaving existing state untouched.
    pub fn initialize(
        &self,
        client_info: Implementation,
        client_capabilities: ClientCapabilities,
    ) -> bool {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return false;
        }
        *self.client_info.lock().expect("client_info lock poisoned") = Some(client_info);
        *self
            .client_capabilities
            .lock()
            .expect("client_capabilities lock poisoned") = Some(client_capabilities);
        true
    }

    /// Returns whether `initialize` has been accepted.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Arms the list-changed notifier exactly once.
    ///
    /// Returns true on the first call, false on repeats (duplicate
    /// `notifications/initialized`).
    pub fn arm_change_notifier(&self) -> bool {
        !self.change_notifier_armed.swap(true, Ordering::AcqRel)
    }

    /// Returns the client info, if initialized.
    #[must_use]
    pub fn client_info(&self) -> Option<Implementation> {
        self.client_info
            .lock()
            .expect("client_info lock poisoned")
            .clone()
    }

    /// Returns the client capabilities, if initialized.
    #[must_use]
    pub fn client_capabilities(&self) -> Option<ClientCapabilities> {
        self.client_capabilities
            .lock()
            .expect("client_capabilities lock poisoned")
            .clone()
    }

    /// Adds a resource subscription.
    pub fn subscribe_resource(&self, uri: impl Into<String>) {
        self.subscribed_resources
            .lock()
            .expect("subscriptions lock poisoned")
            .insert(uri.into());
    }

    /// Removes a resource subscription.
    pub fn unsubscribe_resource(&self, uri: &str) {
        self.subscribed_resources
            .lock()
            .expect("subscriptions lock poisoned")
            .remove(uri);
    }

    /// Returns whether the client is subscribed to a URI.
    #[must_use]
    pub fn is_subscribed(&self, uri: &str) -> bool {
        self.subscribed_resources
            .lock()
            .expect("subscriptions lock poisoned")
            .contains(uri)
    }

    /// Stores the client's requested log level.
    pub fn set_log_level(&self, level: LogLevel) {
        *self.log_level.lock().expect("log_level lock poisoned") = Some(level);
    }

    /// Returns whether a message at `level` should be sent.
    ///
    /// Everything passes until the client sets a level.
    #[must_use]
    pub fn level_enabled(&self, level: LogLevel) -> bool {
        match *self.log_level.lock().expect("log_level lock poisoned") {
            Some(minimum) => level >= minimum,
            None => true,
        }
    }
}
