//! Resolution of the configuration declared by a group.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use log::debug;

use super::Configuration;
use crate::{
    descriptor::{ConfigurationSource, GroupDescriptor},
    error::ConfigurationError,
    panic::format_panic,
};

/// Builds the configuration used when a group declares none.
pub type DefaultConfiguration = Arc<dyn Fn() -> Arc<dyn Configuration> + Send + Sync>;

/// Turns a [`GroupDescriptor`] into exactly one configuration value.
///
/// - A declared value is returned as the identical instance.
/// - A declared producer is invoked once per call to [`resolve`](Self::resolve).
/// - Without a declaration, a fresh default is built.
#[derive(Clone, Default)]
pub struct ConfigurationResolver {
    default: Option<DefaultConfiguration>,
}

impl fmt::Debug for ConfigurationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("default", &self.default.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl ConfigurationResolver {
    /// Create a resolver falling back to `default` for undeclared groups.
    #[must_use]
    pub fn new(default: Option<DefaultConfiguration>) -> Self { Self { default } }

    /// Resolve the configuration for `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Ambiguous`] when more than one source is
    /// declared, [`ConfigurationError::ProducerFailed`] when the producer
    /// fails or panics, and [`ConfigurationError::NoDefault`] when nothing is
    /// declared and no default is available.
    pub fn resolve(
        &self,
        descriptor: &GroupDescriptor,
    ) -> Result<Arc<dyn Configuration>, ConfigurationError> {
        let group = descriptor.name();
        match descriptor.configuration_sources() {
            [] => {
                let default = self.default.as_ref().ok_or_else(|| ConfigurationError::NoDefault {
                    group: group.to_owned(),
                })?;
                debug!("using default configuration: group={group}");
                Ok(default())
            }
            [ConfigurationSource::Value(value)] => {
                debug!("using declared configuration value: group={group}");
                Ok(Arc::clone(value))
            }
            [ConfigurationSource::Producer(producer)] => {
                debug!("invoking configuration producer: group={group}");
                match catch_unwind(AssertUnwindSafe(|| producer())) {
                    Ok(Ok(config)) => Ok(config),
                    Ok(Err(source)) => Err(ConfigurationError::ProducerFailed {
                        group: group.to_owned(),
                        source,
                    }),
                    Err(panic) => Err(ConfigurationError::ProducerFailed {
                        group: group.to_owned(),
                        source: format!("producer panicked: {}", format_panic(&panic)).into(),
                    }),
                }
            }
            sources => Err(ConfigurationError::Ambiguous {
                group: group.to_owned(),
                declared: sources.len(),
            }),
        }
    }
}
