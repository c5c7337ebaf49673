//! Embedded TCP backend.
//!
//! [`TcpServer`] runs a tokio accept loop on a runtime it owns, so the rest
//! of the crate stays synchronous. Each accepted connection is handed to the
//! configured [`ConnectionService`]; the default service echoes every byte
//! back until the peer half-closes.

use std::{
    fmt,
    io,
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, join_all},
};
use log::{debug, info, warn};
use tokio::{
    io::{AsyncWriteExt, copy},
    net::{TcpListener, TcpStream},
    runtime::{Builder, Runtime},
    sync::oneshot,
    time::timeout,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::{Configuration, ServerSettings},
    error::BoxError,
    server::Backend,
};

mod accept;
mod backoff;
pub mod client;
#[cfg(test)]
mod tests;

use accept::{AcceptLoop, accept_loop};
pub use backoff::BackoffConfig;
pub use client::{ClientError, TcpClient, TcpClientFactory};

/// Time allowed for open connections to drain when stopping.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Asynchronous handler serving one accepted connection.
pub type ConnectionService =
    Arc<dyn Fn(TcpStream) -> BoxFuture<'static, io::Result<()>> + Send + Sync>;

/// Service writing every received byte back to the peer.
#[must_use]
pub fn echo_service() -> ConnectionService {
    Arc::new(|mut stream: TcpStream| {
        async move {
            let (mut reader, mut writer) = stream.split();
            copy(&mut reader, &mut writer).await?;
            writer.shutdown().await
        }
        .boxed()
    })
}

/// Configuration of the TCP backend.
///
/// # Examples
///
/// ```
/// use testbed::{config::ServerSettings, tcp::TcpConfiguration};
///
/// let config = TcpConfiguration::default()
///     .with_settings(ServerSettings::default().port(0))
///     .workers(2);
/// assert_eq!(config.worker_count(), 2);
/// ```
#[derive(Clone)]
pub struct TcpConfiguration {
    settings: ServerSettings,
    workers: usize,
    backoff: BackoffConfig,
    service: ConnectionService,
}

impl Default for TcpConfiguration {
    fn default() -> Self {
        Self {
            settings: ServerSettings::default(),
            workers: 1,
            backoff: BackoffConfig::default(),
            service: echo_service(),
        }
    }
}

impl fmt::Debug for TcpConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConfiguration")
            .field("settings", &self.settings)
            .field("workers", &self.workers)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl TcpConfiguration {
    /// Replace the backend-independent settings.
    #[must_use]
    pub fn with_settings(mut self, settings: ServerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the number of accept loops. At least one is always used.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Configure the accept loop back-off. Values are normalised.
    #[must_use]
    pub fn accept_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Serve connections with `service` instead of echoing.
    #[must_use]
    pub fn service<F>(mut self, service: F) -> Self
    where
        F: Fn(TcpStream) -> BoxFuture<'static, io::Result<()>> + Send + Sync + 'static,
    {
        self.service = Arc::new(service);
        self
    }

    /// Number of accept loops.
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.workers }

    /// Accept loop back-off.
    #[must_use]
    pub const fn backoff_config(&self) -> BackoffConfig { self.backoff }
}

impl Configuration for TcpConfiguration {
    fn settings(&self) -> &ServerSettings { &self.settings }
}

struct Running {
    runtime: Runtime,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    local_addr: SocketAddr,
}

impl Running {
    fn close(self, limit: Duration) -> Result<(), BoxError> {
        self.shutdown.cancel();
        self.tracker.close();
        let drained = self
            .runtime
            .block_on(timeout(limit, self.tracker.wait()))
            .is_ok();
        self.runtime.shutdown_timeout(limit);
        if drained {
            Ok(())
        } else {
            Err(format!("tasks still running after {limit:?}").into())
        }
    }
}

/// Embedded TCP server.
pub struct TcpServer {
    config: Arc<TcpConfiguration>,
    running: Option<Running>,
}

impl fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpServer")
            .field("config", &self.config)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

impl TcpServer {
    /// Create an unstarted server for `config`.
    #[must_use]
    pub fn new(config: Arc<TcpConfiguration>) -> Self {
        Self {
            config,
            running: None,
        }
    }

    /// The configuration the server was built from.
    #[must_use]
    pub fn config(&self) -> &Arc<TcpConfiguration> { &self.config }

    fn bind(&self) -> io::Result<StdTcpListener> {
        let settings = self.config.settings();
        let listener = StdTcpListener::bind((settings.host_name(), settings.port_number()))?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }
}

impl Backend for TcpServer {
    fn name(&self) -> &'static str { "tcp" }

    fn start(&mut self) -> Result<(), BoxError> {
        if self.running.is_some() {
            return Ok(());
        }
        let workers = self.config.worker_count();
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("testbed-tcp")
            .enable_all()
            .build()?;
        let std_listener = self.bind()?;
        let local_addr = std_listener.local_addr()?;
        let listener = {
            let _guard = runtime.enter();
            Arc::new(TcpListener::from_std(std_listener)?)
        };
        debug!("listener bound: addr={local_addr}, workers={workers}");

        let shutdown = CancellationToken::new();
        let tracker = TaskTracker::new();
        let mut ready = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = oneshot::channel();
            ready.push(rx);
            runtime.spawn(tracker.track_future(accept_loop(AcceptLoop {
                listener: Arc::clone(&listener),
                service: Arc::clone(&self.config.service),
                shutdown: shutdown.clone(),
                tracker: tracker.clone(),
                backoff: self.config.backoff_config(),
                ready: tx,
            })));
        }
        let running = Running {
            runtime,
            shutdown,
            tracker,
            local_addr,
        };

        let limit = self.config.settings().startup_timeout_duration();
        let started = match running.runtime.block_on(timeout(limit, join_all(ready))) {
            Ok(signals) if signals.iter().all(Result::is_ok) => Ok(()),
            Ok(_) => Err("accept loop exited before becoming ready".to_owned()),
            Err(_) => Err(format!("accept loops not ready within {limit:?}")),
        };
        if let Err(reason) = started {
            if let Err(e) = running.close(SHUTDOWN_TIMEOUT) {
                warn!("failed to release listener after aborted start: error={e}");
            }
            return Err(reason.into());
        }
        info!("tcp server listening: addr={local_addr}");
        self.running = Some(running);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        let addr = running.local_addr;
        running.close(SHUTDOWN_TIMEOUT)?;
        debug!("tcp server closed: addr={addr}");
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("failed to stop tcp server on drop: error={e}");
        }
    }
}
