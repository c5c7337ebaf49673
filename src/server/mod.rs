//! Embedded server handles.
//!
//! A [`Backend`] is the concrete embedded server. [`ServerHandle`] wraps one
//! backend together with its resolved configuration and tracks the
//! `Created → Started → Stopped` lifecycle. Only
//! [`ServerLifecycle`](lifecycle::ServerLifecycle) drives transitions; cases
//! receive a shared reference and may only observe.

use std::{
    fmt,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, info};

use crate::{
    config::{Configuration, ServerSettings},
    error::{BoxError, ServerError},
};

pub mod lifecycle;
#[cfg(test)]
pub(crate) mod test_util;

pub use lifecycle::ServerLifecycle;

/// Capability set every embedded server implements.
#[cfg_attr(test, mockall::automock)]
pub trait Backend: Send {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// URL scheme served by the backend.
    fn scheme(&self) -> &'static str { "tcp" }

    /// Start listening. Blocks until the server accepts connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be started. Resources
    /// acquired before the failure must be released by [`Backend::stop`].
    fn start(&mut self) -> Result<(), BoxError>;

    /// Stop listening and release every resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the server could not be stopped cleanly.
    fn stop(&mut self) -> Result<(), BoxError>;

    /// Address the server listens on while started.
    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Lifecycle state of a [`ServerHandle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    /// Built but never started.
    Created,
    /// Accepting connections.
    Started,
    /// Stopped; cannot be started again.
    Stopped,
}

struct Inner {
    backend: Box<dyn Backend>,
    state: ServerState,
    start_attempted: bool,
    start_failed: bool,
}

/// A server instance shared by every case of a group.
pub struct ServerHandle {
    inner: Mutex<Inner>,
    name: &'static str,
    scheme: &'static str,
    configuration: Arc<dyn Configuration>,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle")
            .field("backend", &self.name)
            .field("state", &self.state())
            .field("configuration", &self.configuration)
            .finish()
    }
}

impl ServerHandle {
    /// Wrap an unstarted backend.
    #[must_use]
    pub fn new(backend: Box<dyn Backend>, configuration: Arc<dyn Configuration>) -> Self {
        Self {
            name: backend.name(),
            scheme: backend.scheme(),
            inner: Mutex::new(Inner {
                backend,
                state: ServerState::Created,
                start_attempted: false,
                start_failed: false,
            }),
            configuration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the backend.
    ///
    /// Returns `Ok(false)` when the server was already started. The backend
    /// is asked to start at most once; after a failed start every further
    /// call returns [`ServerError::StartFailed`].
    pub(crate) fn start(&self) -> Result<bool, ServerError> {
        let mut inner = self.lock();
        match inner.state {
            ServerState::Started => return Ok(false),
            ServerState::Stopped => {
                return Err(ServerError::AlreadyStopped { backend: self.name });
            }
            ServerState::Created if inner.start_failed => {
                return Err(ServerError::StartFailed { backend: self.name });
            }
            ServerState::Created => {}
        }
        inner.start_attempted = true;
        debug!("starting server: backend={}", self.name);
        if let Err(source) = inner.backend.start() {
            inner.start_failed = true;
            return Err(ServerError::Start {
                backend: self.name,
                source,
            });
        }
        inner.state = ServerState::Started;
        let addr = inner.backend.local_addr();
        drop(inner);
        info!("server started: backend={}, addr={addr:?}", self.name);
        Ok(true)
    }

    /// Refuse any further start without asking the backend.
    pub(crate) fn fail_start(&self) { self.lock().start_failed = true; }

    /// Whether a start was attempted and failed.
    #[must_use]
    pub fn start_failed(&self) -> bool { self.lock().start_failed }

    /// Stop the backend.
    ///
    /// The handle reaches [`ServerState::Stopped`] even when the backend
    /// fails to stop. Returns `Ok(false)` when it was already stopped.
    pub(crate) fn stop(&self) -> Result<bool, ServerError> {
        let mut inner = self.lock();
        if inner.state == ServerState::Stopped {
            return Ok(false);
        }
        inner.state = ServerState::Stopped;
        if !inner.start_attempted {
            debug!("server never started, nothing to stop: backend={}", self.name);
            return Ok(true);
        }
        debug!("stopping server: backend={}", self.name);
        inner
            .backend
            .stop()
            .map_err(|source| ServerError::Stop {
                backend: self.name,
                source,
            })?;
        drop(inner);
        info!("server stopped: backend={}", self.name);
        Ok(true)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState { self.lock().state }

    /// Whether the server accepts connections.
    #[must_use]
    pub fn is_started(&self) -> bool { self.state() == ServerState::Started }

    /// Name of the backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str { self.name }

    /// URL scheme served by the backend.
    #[must_use]
    pub fn scheme(&self) -> &'static str { self.scheme }

    /// The resolved configuration, as the identical shared instance.
    #[must_use]
    pub fn configuration(&self) -> &Arc<dyn Configuration> { &self.configuration }

    /// Backend-independent settings of the configuration.
    #[must_use]
    pub fn settings(&self) -> &ServerSettings { self.configuration.settings() }

    /// Address the server listens on, when started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        let inner = self.lock();
        match inner.state {
            ServerState::Started => inner.backend.local_addr(),
            ServerState::Created | ServerState::Stopped => None,
        }
    }

    /// Host the server binds to.
    #[must_use]
    pub fn host(&self) -> &str { self.settings().host_name() }

    /// Bound port when started, the configured port otherwise.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr()
            .map_or_else(|| self.settings().port_number(), |addr| addr.port())
    }

    /// Context path.
    #[must_use]
    pub fn path(&self) -> &str { self.settings().context_path() }

    /// Base URL, for example `tcp://127.0.0.1:40000/`.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{}://{}:{}{}",
            self.scheme,
            self.host(),
            self.port(),
            self.path()
        )
    }
}
