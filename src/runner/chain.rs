//! Ordered execution chain of a group.
//!
//! The chain is split by scope. Group entries run once, before the first
//! case; case entries run around every case; the teardown entry runs once,
//! after the last case. Each scope has its own entry type, so a case-scoped
//! step cannot be registered as group-scoped.

use std::fmt;

use crate::descriptor::{GroupDescriptor, InjectionPoint};

/// Steps run once, before the first case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupEntry {
    /// Resolve the declared configuration.
    ResolveConfiguration,
    /// Create the group's server through the factory.
    AcquireServer,
    /// Start the server and run its lifecycle hooks.
    StartServer,
}

/// Step run once, after the last case, whatever happened before.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownEntry {
    /// Stop the server.
    StopServer,
}

/// Steps run around every case.
#[derive(Clone)]
pub enum CaseEntry {
    /// Activate the group's hooks, then the case's own hooks.
    AttachHooks {
        /// Number of hooks declared on the group.
        declared: usize,
    },
    /// Inject a value at a declared marker.
    Inject(InjectionPoint),
    /// Run the case body.
    RunBody,
    /// Release injected clients and deactivate every active hook.
    DetachHooks,
}

impl CaseEntry {
    /// Whether the entry runs even after an earlier entry failed.
    #[must_use]
    pub const fn is_guaranteed(&self) -> bool { matches!(self, Self::DetachHooks) }
}

impl fmt::Debug for CaseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttachHooks { declared } => f
                .debug_struct("AttachHooks")
                .field("declared", declared)
                .finish(),
            Self::Inject(point) => f.debug_tuple("Inject").field(point).finish(),
            Self::RunBody => f.write_str("RunBody"),
            Self::DetachHooks => f.write_str("DetachHooks"),
        }
    }
}

/// The ordered entries of a group, partitioned by scope.
#[derive(Clone, Debug)]
pub struct ExecutionChain {
    group: Vec<GroupEntry>,
    case: Vec<CaseEntry>,
    teardown: TeardownEntry,
}

impl ExecutionChain {
    /// Build the chain for `descriptor`.
    #[must_use]
    pub fn build(descriptor: &GroupDescriptor) -> Self {
        let group = vec![
            GroupEntry::ResolveConfiguration,
            GroupEntry::AcquireServer,
            GroupEntry::StartServer,
        ];

        let mut case = Vec::with_capacity(descriptor.injections().len() + 3);
        case.push(CaseEntry::AttachHooks {
            declared: descriptor.hooks().len(),
        });
        case.extend(descriptor.injections().iter().cloned().map(CaseEntry::Inject));
        case.push(CaseEntry::RunBody);
        case.push(CaseEntry::DetachHooks);

        Self {
            group,
            case,
            teardown: TeardownEntry::StopServer,
        }
    }

    /// Entries run once, before the first case.
    #[must_use]
    pub fn group_entries(&self) -> &[GroupEntry] { &self.group }

    /// Entries run around every case.
    #[must_use]
    pub fn case_entries(&self) -> &[CaseEntry] { &self.case }

    /// Entry run once, after the last case.
    #[must_use]
    pub const fn teardown(&self) -> TeardownEntry { self.teardown }
}
