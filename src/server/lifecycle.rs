//! Ownership of the single server of a group.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use log::{debug, error, warn};

use super::{ServerHandle, ServerState};
use crate::{
    config::{Configuration, ServerHook},
    descriptor::GroupDescriptor,
    error::{BoxError, ServerError, UnsupportedConfigurationError},
    factory::ServerFactory,
    panic::format_panic,
};

/// Run `call` on every server hook, reporting the first panic.
///
/// Every hook runs even when an earlier one panicked.
fn run_hooks(
    server: &ServerHandle,
    stage: &'static str,
    call: fn(&dyn ServerHook, &ServerHandle),
) -> Result<(), BoxError> {
    let mut first = None;
    for hook in server.settings().hooks() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| call(hook.as_ref(), server))) {
            let message = format_panic(&panic).to_string();
            error!(
                "server hook panicked: backend={}, stage={stage}, panic={message}",
                server.backend_name()
            );
            first.get_or_insert(message);
        }
    }
    first.map_or(Ok(()), |message| {
        Err(format!("{stage} hook panicked: {message}").into())
    })
}

/// Creates, starts and stops the server shared by one group.
///
/// The first [`acquire`](Self::acquire) builds the server through the
/// [`ServerFactory`]; later calls return the cached handle. The server is
/// started at most once and stopped exactly once, either through
/// [`stop`](Self::stop) or when the manager is dropped.
pub struct ServerLifecycle {
    factory: Arc<ServerFactory>,
    group: Option<String>,
    server: Option<Arc<ServerHandle>>,
}

impl std::fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("group", &self.group)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl ServerLifecycle {
    /// Create a manager building servers through `factory`.
    #[must_use]
    pub fn new(factory: Arc<ServerFactory>) -> Self {
        Self {
            factory,
            group: None,
            server: None,
        }
    }

    /// Return the group's server, creating it on the first call.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedConfigurationError`] if no backend is registered
    /// for the configuration type.
    pub fn acquire(
        &mut self,
        descriptor: &GroupDescriptor,
        configuration: Arc<dyn Configuration>,
    ) -> Result<Arc<ServerHandle>, UnsupportedConfigurationError> {
        if let Some(server) = &self.server {
            if self.group.as_deref() != Some(descriptor.name()) {
                warn!(
                    "server already acquired for another group: owner={:?}, requested={}",
                    self.group,
                    descriptor.name()
                );
            }
            return Ok(Arc::clone(server));
        }
        let server = Arc::new(self.factory.create(configuration)?);
        debug!(
            "server acquired: group={}, backend={}",
            descriptor.name(),
            server.backend_name()
        );
        self.group = Some(descriptor.name().to_owned());
        self.server = Some(Arc::clone(&server));
        Ok(server)
    }

    /// The acquired server, if any.
    #[must_use]
    pub fn server(&self) -> Option<&Arc<ServerHandle>> { self.server.as_ref() }

    /// Start the acquired server, running its lifecycle hooks.
    ///
    /// Starting an already started server is a no-op. Starting before
    /// anything was acquired does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Start`] if the backend failed to start or a
    /// `pre_start`/`on_started` hook panicked, [`ServerError::StartFailed`]
    /// if an earlier start failed and [`ServerError::AlreadyStopped`] if the
    /// server was stopped.
    pub fn start(&mut self) -> Result<(), ServerError> {
        let Some(server) = &self.server else {
            return Ok(());
        };
        if server.state() != ServerState::Created || server.start_failed() {
            return server.start().map(drop);
        }
        if let Err(source) = run_hooks(server, "pre_start", |hook, server| hook.pre_start(server)) {
            server.fail_start();
            return Err(ServerError::Start {
                backend: server.backend_name(),
                source,
            });
        }
        if server.start()? {
            run_hooks(server, "on_started", |hook, server| hook.on_started(server)).map_err(
                |source| ServerError::Start {
                    backend: server.backend_name(),
                    source,
                },
            )?;
        }
        Ok(())
    }

    /// Stop the acquired server.
    ///
    /// Runs regardless of whether start succeeded. Stopping twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stop`] if the backend failed to stop or a
    /// `post_stop` hook panicked. The server is considered stopped either
    /// way.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        let Some(server) = &self.server else {
            return Ok(());
        };
        let result = server.stop();
        if matches!(result, Ok(false)) {
            return Ok(());
        }
        let hooks = run_hooks(server, "post_stop", |hook, server| hook.post_stop(server));
        match (result, hooks) {
            (Err(e), _) => Err(e),
            (Ok(_), Err(source)) => Err(ServerError::Stop {
                backend: server.backend_name(),
                source,
            }),
            (Ok(_), Ok(())) => Ok(()),
        }
    }
}

impl Drop for ServerLifecycle {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop server on drop: error={e}");
        }
    }
}
