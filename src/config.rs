//! Server configuration values.
//!
//! Every backend defines its own configuration type implementing
//! [`Configuration`]. The backend-independent part (address, context path,
//! startup timeout and lifecycle hooks) lives in [`ServerSettings`], which
//! each configuration embeds and exposes through
//! [`Configuration::settings`].

use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
    time::Duration,
};

use crate::server::ServerHandle;

mod resolver;

pub use resolver::{ConfigurationResolver, DefaultConfiguration};

/// Type-erasure helpers implemented for every `'static` value.
pub trait AsAny: Any + Send + Sync {
    /// Borrow `self` as [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Convert a shared pointer to `self` into a shared [`Any`] pointer.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    /// Name of the concrete type behind `self`.
    fn concrete_type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any { self }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }

    fn concrete_type_name(&self) -> &'static str { std::any::type_name::<T>() }
}

/// Callbacks invoked around the start and stop of a server.
///
/// Hooks are declared on a configuration and therefore share its scope: they
/// run once per group, never per case.
pub trait ServerHook: Send + Sync {
    /// Invoked before the backend starts.
    fn pre_start(&self, _server: &ServerHandle) {}

    /// Invoked once the backend reports a successful start.
    fn on_started(&self, _server: &ServerHandle) {}

    /// Invoked after the backend stopped, whether or not stopping succeeded.
    fn post_stop(&self, _server: &ServerHandle) {}
}

/// Default host the servers bind to.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default context path.
pub const DEFAULT_PATH: &str = "/";
/// Default time allowed for a backend to start.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend-independent server settings.
///
/// # Examples
///
/// ```
/// use testbed::config::ServerSettings;
///
/// let settings = ServerSettings::default().port(8080).path("api");
/// assert_eq!(settings.port_number(), 8080);
/// assert_eq!(settings.context_path(), "/api");
/// ```
#[derive(Clone)]
pub struct ServerSettings {
    host: String,
    port: u16,
    path: String,
    startup_timeout: Duration,
    hooks: Vec<Arc<dyn ServerHook>>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: 0,
            path: DEFAULT_PATH.to_owned(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            hooks: Vec::new(),
        }
    }
}

impl fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("startup_timeout", &self.startup_timeout)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl ServerSettings {
    /// Set the host the server binds to.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port. `0` requests an ephemeral port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the context path. A leading `/` is added when missing.
    #[must_use]
    pub fn path(mut self, path: &str) -> Self {
        self.path = if path.starts_with('/') {
            path.to_owned()
        } else {
            format!("/{path}")
        };
        self
    }

    /// Set the time allowed for the backend to start.
    #[must_use]
    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Register a server lifecycle hook.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn ServerHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Configured host.
    #[must_use]
    pub fn host_name(&self) -> &str { &self.host }

    /// Configured port; `0` means ephemeral.
    #[must_use]
    pub const fn port_number(&self) -> u16 { self.port }

    /// Configured context path, always starting with `/`.
    #[must_use]
    pub fn context_path(&self) -> &str { &self.path }

    /// Configured startup timeout.
    #[must_use]
    pub const fn startup_timeout_duration(&self) -> Duration { self.startup_timeout }

    /// Registered lifecycle hooks, in registration order.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn ServerHook>] { &self.hooks }
}

/// Opaque backend-specific configuration.
///
/// The concrete type selects the backend through
/// [`ServerFactory`](crate::factory::ServerFactory).
pub trait Configuration: AsAny + fmt::Debug {
    /// Backend-independent settings.
    fn settings(&self) -> &ServerSettings;
}

impl dyn Configuration {
    /// Downcast to the concrete configuration type.
    #[must_use]
    pub fn downcast_ref<C: Configuration>(&self) -> Option<&C> { self.as_any().downcast_ref() }

    /// Whether the concrete configuration type is `C`.
    #[must_use]
    pub fn is<C: Configuration>(&self) -> bool { self.as_any().is::<C>() }

    /// [`TypeId`] of the concrete configuration type.
    #[must_use]
    pub fn config_type(&self) -> TypeId { self.as_any().type_id() }
}
