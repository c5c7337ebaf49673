#![doc(html_root_url = "https://docs.rs/testbed/latest")]
//! Embedded server lifecycle for grouped tests.
//!
//! A group of test cases shares one embedded server. The [`runner`] module
//! resolves the group's configuration, builds the matching backend through
//! the [`factory`], starts it before the first case and stops it after the
//! last one. Case-scoped [`hooks`] are activated around every case, and
//! servers or clients are injected into cases by marker.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use testbed::{
//!     descriptor::GroupDescriptor,
//!     factory::ServerFactory,
//!     runner::{GroupRunner, TestCase},
//!     tcp::{TcpClient, TcpClientFactory},
//! };
//!
//! let descriptor = GroupDescriptor::new("echo").inject_client("client", Arc::new(TcpClientFactory::new()));
//! let runner = GroupRunner::new(descriptor, Arc::new(ServerFactory::tcp()));
//! let report = runner.run([TestCase::new("ping", |ctx| {
//!     let client = ctx.client::<TcpClient>("client").ok_or("no client")?;
//!     assert_eq!(client.request(b"ping")?, b"ping");
//!     Ok(())
//! })]);
//! assert!(report.is_success());
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod extensions;
pub mod factory;
pub mod hooks;
pub mod panic;
pub mod runner;
pub mod server;
pub mod tcp;

pub use config::{Configuration, ServerSettings};
pub use context::CaseContext;
pub use descriptor::{DescribeGroup, GroupDescriptor};
pub use error::BoxError;
pub use factory::ServerFactory;
pub use runner::{GroupReport, GroupRunner, TestCase};
pub use server::{ServerHandle, ServerState};
