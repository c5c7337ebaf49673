//! Canonical error types for the crate.
//!
//! Errors are split by scope. [`GroupError`] aborts a whole group before any
//! case runs, [`CaseError`] fails a single case, and [`ServerError::Stop`] is
//! reported as teardown without replacing any case outcome.

use thiserror::Error;

/// Boxed error returned by user supplied producers, hooks, backends and case
/// bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to resolve the configuration declared by a group.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// More than one configuration source was declared.
    #[error("group {group} declares {declared} configuration sources; expected at most one")]
    Ambiguous {
        /// Name of the offending group.
        group: String,
        /// Number of declared sources.
        declared: usize,
    },
    /// The declared producer returned an error or panicked.
    #[error("configuration producer for group {group} failed: {source}")]
    ProducerFailed {
        /// Name of the offending group.
        group: String,
        /// Error raised by the producer.
        #[source]
        source: BoxError,
    },
    /// No source was declared and no default backend is registered.
    #[error("group {group} declares no configuration and no default backend is registered")]
    NoDefault {
        /// Name of the offending group.
        group: String,
    },
}

/// No backend is registered for the resolved configuration type.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("no server backend registered for configuration type {type_name}")]
pub struct UnsupportedConfigurationError {
    /// Type name of the unsupported configuration.
    pub type_name: &'static str,
}

/// Errors raised while starting or stopping a server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The backend failed to start.
    #[error("failed to start {backend} server: {source}")]
    Start {
        /// Backend name.
        backend: &'static str,
        /// Error raised by the backend.
        #[source]
        source: BoxError,
    },
    /// The backend failed to stop.
    #[error("failed to stop {backend} server: {source}")]
    Stop {
        /// Backend name.
        backend: &'static str,
        /// Error raised by the backend.
        #[source]
        source: BoxError,
    },
    /// An earlier start failed; the backend is not started again.
    #[error("{backend} server failed to start earlier")]
    StartFailed {
        /// Backend name.
        backend: &'static str,
    },
    /// A stopped server cannot be started again.
    #[error("{backend} server was already stopped")]
    AlreadyStopped {
        /// Backend name.
        backend: &'static str,
    },
}

/// Errors raised by case-scoped hooks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HookError {
    /// A hook failed to activate.
    #[error("hook {hook} failed to attach: {source}")]
    Attach {
        /// Hook name.
        hook: String,
        /// Error raised by the hook.
        #[source]
        source: BoxError,
    },
    /// A hook failed to deactivate.
    #[error("hook {hook} failed to detach: {source}")]
    Detach {
        /// Hook name.
        hook: String,
        /// Error raised by the hook.
        #[source]
        source: BoxError,
    },
    /// Hooks from a previous case are still active.
    #[error("hook {hook} is still active from a previous case")]
    StillActive {
        /// Hook name.
        hook: String,
    },
}

/// Errors raised while injecting values into a case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InjectionError {
    /// The client factory for an injection point failed.
    #[error("failed to create client for injection point {marker}: {source}")]
    ClientCreation {
        /// Marker of the injection point.
        marker: String,
        /// Error raised by the client factory.
        #[source]
        source: BoxError,
    },
    /// An injected client failed to close after the case.
    #[error("failed to close client for injection point {marker}: {source}")]
    ClientClose {
        /// Marker of the injection point.
        marker: String,
        /// Error raised by the client.
        #[source]
        source: BoxError,
    },
}

/// Group-level failures. None of the group's cases run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GroupError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// No backend matches the resolved configuration.
    #[error(transparent)]
    Unsupported(#[from] UnsupportedConfigurationError),
    /// The server failed to start.
    #[error(transparent)]
    Start(#[from] ServerError),
    /// A case was requested before the group was started.
    #[error("group {group} has not been started")]
    NotStarted {
        /// Name of the group.
        group: String,
    },
}

/// Case-level failures. Other cases in the group still run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CaseError {
    /// A hook failed to attach.
    #[error(transparent)]
    Hook(#[from] HookError),
    /// A value could not be injected.
    #[error(transparent)]
    Injection(#[from] InjectionError),
    /// The case body returned an error.
    #[error("case failed: {0}")]
    Failed(#[source] BoxError),
    /// The case body panicked.
    #[error("case panicked: {0}")]
    Panicked(String),
}
