//! Blocking client for the TCP backend.

use std::{io, net::SocketAddr, time::Duration};

use log::debug;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    runtime::{Builder, Runtime},
    time::timeout,
};

use crate::{
    client::{Client, ClientFactory, Interceptors},
    context::CaseContext,
    error::BoxError,
    server::ServerHandle,
};

/// Default time allowed for one request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors emitted by [`TcpClient`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The server is not listening.
    #[error("server {backend} is not started")]
    NotStarted {
        /// Backend of the server.
        backend: &'static str,
    },
    /// Transport error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The exchange did not finish in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    /// The client was closed.
    #[error("client closed")]
    Closed,
}

/// Sends one request per connection and reads the full response.
///
/// Each [`request`](Self::request) connects, writes the payload, half-closes
/// the socket and reads until the server closes its side.
#[derive(Debug)]
pub struct TcpClient {
    addr: SocketAddr,
    runtime: Runtime,
    interceptors: Interceptors,
    timeout: Duration,
    closed: bool,
}

impl TcpClient {
    /// Create a client for the started `server`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotStarted`] if the server is not listening,
    /// or [`ClientError::Io`] if the client runtime cannot be built.
    pub fn connect(server: &ServerHandle) -> Result<Self, ClientError> {
        let addr = server.local_addr().ok_or(ClientError::NotStarted {
            backend: server.backend_name(),
        })?;
        Self::with_addr(addr)
    }

    /// Create a client for `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the client runtime cannot be built.
    pub fn with_addr(addr: SocketAddr) -> Result<Self, ClientError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            addr,
            runtime,
            interceptors: Interceptors::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            closed: false,
        })
    }

    /// Apply `interceptors` to every exchange.
    #[must_use]
    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// Set the time allowed for one exchange.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address of the server.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr { self.addr }

    /// Send `payload` and return the server's response.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the client was closed, the exchange
    /// failed or it timed out.
    pub fn request(&self, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        if self.closed {
            return Err(ClientError::Closed);
        }
        let mut request = payload.to_vec();
        self.interceptors.intercept_request(&mut request);
        let mut response = self
            .runtime
            .block_on(timeout(self.timeout, exchange(self.addr, &request)))
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        self.interceptors.intercept_response(&mut response);
        debug!(
            "exchange complete: addr={}, sent={}, received={}",
            self.addr,
            request.len(),
            response.len()
        );
        Ok(response)
    }
}

async fn exchange(addr: SocketAddr, request: &[u8]) -> io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request).await?;
    stream.shutdown().await?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(response)
}

impl Client for TcpClient {
    fn close(&mut self) -> Result<(), BoxError> {
        self.closed = true;
        Ok(())
    }
}

/// Creates a [`TcpClient`] per case.
///
/// The client takes a snapshot of the [`Interceptors`] found in the case's
/// extensions, so interceptors installed by case hooks apply to that case
/// only.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpClientFactory {
    timeout: Option<Duration>,
}

impl TcpClientFactory {
    /// Create a factory using the default request timeout.
    #[must_use]
    pub const fn new() -> Self { Self { timeout: None } }

    /// Set the request timeout of created clients.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl ClientFactory for TcpClientFactory {
    fn create(
        &self,
        server: &ServerHandle,
        ctx: &CaseContext,
    ) -> Result<Box<dyn Client>, BoxError> {
        let mut client = TcpClient::connect(server)?;
        if let Some(interceptors) = ctx.extensions().get::<Interceptors>() {
            client = client.interceptors(interceptors.clone());
        }
        if let Some(limit) = self.timeout {
            client = client.timeout(limit);
        }
        Ok(Box::new(client))
    }
}
