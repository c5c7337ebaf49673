//! Mapping from configuration types to server backends.

use std::{
    any::TypeId,
    collections::HashMap,
    fmt,
    sync::Arc,
};

use crate::{
    config::{Configuration, ConfigurationResolver, DefaultConfiguration},
    error::UnsupportedConfigurationError,
    server::{Backend, ServerHandle},
    tcp::{TcpConfiguration, TcpServer},
};

type BuildBackend = Box<dyn Fn(Arc<dyn Configuration>) -> Option<Box<dyn Backend>> + Send + Sync>;

struct Registration {
    type_name: &'static str,
    build: BuildBackend,
}

/// Builds unstarted servers for resolved configurations.
///
/// Each configuration type maps to exactly one backend. Registering a type
/// again replaces the previous backend.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use testbed::{
///     config::Configuration,
///     factory::ServerFactory,
///     server::ServerState,
///     tcp::TcpConfiguration,
/// };
///
/// let factory = ServerFactory::tcp();
/// let config: Arc<dyn Configuration> = Arc::new(TcpConfiguration::default());
/// let server = factory.create(config).expect("tcp backend registered");
/// assert_eq!(server.state(), ServerState::Created);
/// ```
#[derive(Default)]
pub struct ServerFactory {
    backends: HashMap<TypeId, Registration>,
    default: Option<DefaultConfiguration>,
}

impl fmt::Debug for ServerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerFactory")
            .field(
                "backends",
                &self
                    .backends
                    .values()
                    .map(|registration| registration.type_name)
                    .collect::<Vec<_>>(),
            )
            .field("default", &self.default.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ServerFactory {
    /// Create a factory without any backend.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a factory serving [`TcpConfiguration`] with [`TcpServer`],
    /// which is also the default configuration.
    #[must_use]
    pub fn tcp() -> Self {
        Self::new()
            .register(TcpServer::new)
            .with_default::<TcpConfiguration>()
    }

    /// Register the backend built by `build` for configurations of type `C`.
    #[must_use]
    pub fn register<C, B, F>(mut self, build: F) -> Self
    where
        C: Configuration,
        B: Backend + 'static,
        F: Fn(Arc<C>) -> B + Send + Sync + 'static,
    {
        let build: BuildBackend = Box::new(move |config: Arc<dyn Configuration>| {
            config
                .into_any()
                .downcast::<C>()
                .ok()
                .map(|config| Box::new(build(config)) as Box<dyn Backend>)
        });
        self.backends.insert(
            TypeId::of::<C>(),
            Registration {
                type_name: std::any::type_name::<C>(),
                build,
            },
        );
        self
    }

    /// Use `C::default()` for groups declaring no configuration.
    #[must_use]
    pub fn with_default<C: Configuration + Default>(self) -> Self {
        self.with_default_from(|| Arc::new(C::default()))
    }

    /// Build the configuration of groups declaring none with `make`.
    ///
    /// `make` runs once per resolution, so every group gets a fresh value.
    #[must_use]
    pub fn with_default_from<C, F>(mut self, make: F) -> Self
    where
        C: Configuration,
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        let default: DefaultConfiguration = Arc::new(move || make() as Arc<dyn Configuration>);
        self.default = Some(default);
        self
    }

    /// Whether a backend is registered for the type of `config`.
    #[must_use]
    pub fn supports(&self, config: &dyn Configuration) -> bool {
        self.backends.contains_key(&config.config_type())
    }

    /// Resolver falling back to this factory's default configuration.
    #[must_use]
    pub fn resolver(&self) -> ConfigurationResolver {
        ConfigurationResolver::new(self.default.clone())
    }

    /// Build an unstarted server for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedConfigurationError`] if no backend is registered
    /// for the configuration type.
    pub fn create(
        &self,
        config: Arc<dyn Configuration>,
    ) -> Result<ServerHandle, UnsupportedConfigurationError> {
        let concrete: &dyn Configuration = &*config;
        let unsupported = UnsupportedConfigurationError {
            type_name: concrete.concrete_type_name(),
        };
        let registration = self
            .backends
            .get(&concrete.config_type())
            .ok_or_else(|| unsupported.clone())?;
        let backend = (registration.build)(Arc::clone(&config)).ok_or(unsupported)?;
        Ok(ServerHandle::new(backend, config))
    }
}
