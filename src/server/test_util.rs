//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use super::{MockBackend, ServerHandle};
use crate::config::{Configuration, ServerSettings};

/// Minimal configuration for unit tests.
#[derive(Debug, Default)]
pub struct TestConfig {
    pub settings: ServerSettings,
}

impl Configuration for TestConfig {
    fn settings(&self) -> &ServerSettings { &self.settings }
}

/// Address reported by mocked backends.
#[must_use]
pub fn mock_addr() -> SocketAddr { SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 40_000) }

/// A backend mock named `mock` serving `tcp`, with no expectations on
/// `start` or `stop`.
#[must_use]
pub fn named_mock() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("mock");
    backend.expect_scheme().return_const("tcp");
    backend.expect_local_addr().return_const(Some(mock_addr()));
    backend
}

/// Wrap `backend` in a handle using [`TestConfig`].
#[must_use]
pub fn handle(backend: MockBackend) -> ServerHandle {
    ServerHandle::new(Box::new(backend), Arc::new(TestConfig::default()))
}
