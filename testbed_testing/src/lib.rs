//! Fakes and fixtures for testing code built on `testbed`.
//!
//! [`RecordingBackend`] stands in for a real embedded server and reports
//! every build, start and stop to a shared [`BackendProbe`]. The hooks in
//! [`hooks`] record activations so tests can assert that hooks never
//! overlap between cases.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use testbed::{GroupDescriptor, GroupRunner, TestCase};
//! use testbed_testing::{BackendProbe, ProbeConfiguration, probe_factory};
//!
//! let probe = Arc::new(BackendProbe::default());
//! let descriptor = GroupDescriptor::new("probe")
//!     .configuration(Arc::new(ProbeConfiguration::new(Arc::clone(&probe))));
//! let report = GroupRunner::new(descriptor, probe_factory()).run([TestCase::new("a", |_| Ok(()))]);
//! assert!(report.is_success());
//! assert_eq!(probe.starts(), 1);
//! assert_eq!(probe.stops(), 1);
//! ```

pub mod backend;
pub mod hooks;
pub mod logging;

pub use backend::{
    BackendProbe,
    ProbeConfiguration,
    RecordingBackend,
    probe_factory,
    probe_factory_with_default,
};
pub use hooks::{FailingHook, RecordingHook};
pub use logging::{LoggerHandle, logger};
