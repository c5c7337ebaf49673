//! Clients bound to a running server.
//!
//! A [`ClientFactory`] builds one [`Client`] per case, after the server
//! started and the case's hooks were attached, so hooks can install
//! [`Interceptors`] that the client picks up for that case only.

use std::fmt;

use crate::{config::AsAny, context::CaseContext, error::BoxError, server::ServerHandle};

mod hooks;

pub use hooks::{AfterReceiveHook, BeforeSendHook, Interceptors};

/// A client injected into a case.
pub trait Client: AsAny + fmt::Debug {
    /// Release the client's resources. Called after the case body.
    ///
    /// # Errors
    ///
    /// Returns an error if the client could not be closed cleanly.
    fn close(&mut self) -> Result<(), BoxError> { Ok(()) }
}

/// Builds clients for a started server.
pub trait ClientFactory: Send + Sync {
    /// Create a client talking to `server` for the case described by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the client could not be created; the case fails.
    fn create(&self, server: &ServerHandle, ctx: &CaseContext)
    -> Result<Box<dyn Client>, BoxError>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ServerHandle, &CaseContext) -> Result<Box<dyn Client>, BoxError> + Send + Sync,
{
    fn create(
        &self,
        server: &ServerHandle,
        ctx: &CaseContext,
    ) -> Result<Box<dyn Client>, BoxError> {
        self(server, ctx)
    }
}
