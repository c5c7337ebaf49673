//! Declarative description of a test group.
//!
//! A [`GroupDescriptor`] is what a host binding discovers for a group: its
//! configuration source, the case-scoped hooks it declares and the injection
//! points its cases expect. Descriptors are built once and never mutated
//! afterwards.

use std::{fmt, sync::Arc};

use crate::{
    client::ClientFactory,
    config::Configuration,
    error::BoxError,
    hooks::CaseHook,
};

/// Callable producing a configuration on demand.
pub type ConfigurationProducer =
    Arc<dyn Fn() -> Result<Arc<dyn Configuration>, BoxError> + Send + Sync>;

/// Where a group's configuration comes from.
#[derive(Clone)]
pub enum ConfigurationSource {
    /// A shared value, returned as the identical instance on every resolution.
    Value(Arc<dyn Configuration>),
    /// A producer invoked once per resolution.
    Producer(ConfigurationProducer),
}

impl fmt::Debug for ConfigurationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Producer(_) => f.write_str("Producer(<fn>)"),
        }
    }
}

/// A value a case expects to receive, addressed by marker.
#[derive(Clone)]
pub enum InjectionPoint {
    /// The group's running server.
    Server {
        /// Marker naming the injection point.
        marker: String,
    },
    /// A client bound to the group's running server.
    Client {
        /// Marker naming the injection point.
        marker: String,
        /// Factory creating the client for each case.
        factory: Arc<dyn ClientFactory>,
    },
}

impl InjectionPoint {
    /// Marker naming this injection point.
    #[must_use]
    pub fn marker(&self) -> &str {
        match self {
            Self::Server { marker } | Self::Client { marker, .. } => marker,
        }
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { marker } => f.debug_struct("Server").field("marker", marker).finish(),
            Self::Client { marker, .. } => f
                .debug_struct("Client")
                .field("marker", marker)
                .finish_non_exhaustive(),
        }
    }
}

/// Description of one test group.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use testbed::{descriptor::GroupDescriptor, tcp::TcpConfiguration};
///
/// let descriptor = GroupDescriptor::new("echo")
///     .configuration(Arc::new(TcpConfiguration::default()))
///     .inject_server("server");
/// assert_eq!(descriptor.name(), "echo");
/// assert_eq!(descriptor.configuration_sources().len(), 1);
/// ```
#[derive(Clone)]
pub struct GroupDescriptor {
    name: String,
    configuration: Vec<ConfigurationSource>,
    hooks: Vec<Arc<dyn CaseHook>>,
    injections: Vec<InjectionPoint>,
}

impl GroupDescriptor {
    /// Start describing the group called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: Vec::new(),
            hooks: Vec::new(),
            injections: Vec::new(),
        }
    }

    /// Declare a shared configuration value.
    #[must_use]
    pub fn configuration<C: Configuration>(mut self, value: Arc<C>) -> Self {
        self.configuration.push(ConfigurationSource::Value(value));
        self
    }

    /// Declare a configuration producer.
    #[must_use]
    pub fn producer<C, F>(mut self, producer: F) -> Self
    where
        C: Configuration,
        F: Fn() -> Result<Arc<C>, BoxError> + Send + Sync + 'static,
    {
        let producer: ConfigurationProducer =
            Arc::new(move || producer().map(|config| config as Arc<dyn Configuration>));
        self.configuration
            .push(ConfigurationSource::Producer(producer));
        self
    }

    /// Declare a hook activated around every case of the group.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn CaseHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Declare an injection point for the running server.
    #[must_use]
    pub fn inject_server(mut self, marker: impl Into<String>) -> Self {
        self.injections.push(InjectionPoint::Server {
            marker: marker.into(),
        });
        self
    }

    /// Declare an injection point for a client created by `factory`.
    #[must_use]
    pub fn inject_client(
        mut self,
        marker: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        self.injections.push(InjectionPoint::Client {
            marker: marker.into(),
            factory,
        });
        self
    }

    /// Name identifying the group.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Declared configuration sources. More than one is ambiguous.
    #[must_use]
    pub fn configuration_sources(&self) -> &[ConfigurationSource] { &self.configuration }

    /// Declared case-scoped hooks.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn CaseHook>] { &self.hooks }

    /// Declared injection points.
    #[must_use]
    pub fn injections(&self) -> &[InjectionPoint] { &self.injections }
}

impl fmt::Debug for GroupDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDescriptor")
            .field("name", &self.name)
            .field("configuration", &self.configuration)
            .field("hooks", &self.hooks.len())
            .field("injections", &self.injections)
            .finish()
    }
}

/// Implemented by host bindings to describe a group type.
pub trait DescribeGroup {
    /// Produce the descriptor for this group.
    fn describe() -> GroupDescriptor;
}
