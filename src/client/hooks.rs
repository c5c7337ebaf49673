//! Request and response interceptors.
//!
//! Interceptors fire on every outgoing request and every incoming response
//! of a client. Case hooks register them in the case's extensions; clients
//! created for that case take a snapshot, so interceptors never outlive the
//! case that installed them.

use std::{fmt, sync::Arc};

/// Interceptor invoked before a request is written to the transport.
///
/// # Examples
///
/// ```rust
/// use std::sync::{
///     Arc,
///     atomic::{AtomicUsize, Ordering},
/// };
///
/// use testbed::client::BeforeSendHook;
///
/// let counter = Arc::new(AtomicUsize::new(0));
/// let count = counter.clone();
/// let hook: BeforeSendHook = Arc::new(move |_bytes: &mut Vec<u8>| {
///     count.fetch_add(1, Ordering::Relaxed);
/// });
/// ```
pub type BeforeSendHook = Arc<dyn Fn(&mut Vec<u8>) + Send + Sync>;

/// Interceptor invoked after a response was read, before it is returned.
pub type AfterReceiveHook = Arc<dyn Fn(&mut Vec<u8>) + Send + Sync>;

/// Interceptors registered for the current case.
///
/// Multiple interceptors of each kind run in registration order.
#[derive(Clone, Default)]
pub struct Interceptors {
    before_send: Vec<BeforeSendHook>,
    after_receive: Vec<AfterReceiveHook>,
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("before_send", &self.before_send.len())
            .field("after_receive", &self.after_receive.len())
            .finish()
    }
}

impl Interceptors {
    /// Register a request interceptor.
    pub fn before_send(&mut self, hook: BeforeSendHook) -> &mut Self {
        self.before_send.push(hook);
        self
    }

    /// Register a response interceptor.
    pub fn after_receive(&mut self, hook: AfterReceiveHook) -> &mut Self {
        self.after_receive.push(hook);
        self
    }

    /// Run every request interceptor over `request`.
    pub fn intercept_request(&self, request: &mut Vec<u8>) {
        for hook in &self.before_send {
            hook(request);
        }
    }

    /// Run every response interceptor over `response`.
    pub fn intercept_response(&self, response: &mut Vec<u8>) {
        for hook in &self.after_receive {
            hook(response);
        }
    }

    /// Whether no interceptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.before_send.is_empty() && self.after_receive.is_empty() }
}
