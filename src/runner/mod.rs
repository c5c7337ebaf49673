//! Coordination of a group's server and cases.
//!
//! [`GroupRunner`] owns everything scoped to one group: the resolved
//! configuration, the single server and the case-scoped hooks. Hosts drive it
//! through three hook points: [`GroupRunner::start_group`] before the first
//! case, [`GroupRunner::run_case`] for every case and
//! [`GroupRunner::end_group`] after the last one. [`GroupRunner::run`]
//! chains the three for hosts without their own sequencing.
//!
//! ```text
//! Unstarted → Resolving → Starting → Running(1..N) → Stopping → Stopped
//!                 │            │
//!                 └────────────┴──────────────────────────────→ Stopped
//! ```

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use log::{debug, error, info, warn};

use crate::{
    config::{Configuration, ConfigurationResolver},
    context::{CaseContext, Injected},
    descriptor::{DescribeGroup, GroupDescriptor, InjectionPoint},
    error::{BoxError, CaseError, GroupError, InjectionError, ServerError},
    factory::ServerFactory,
    hooks::{CaseHook, HookRegistry},
    panic::format_panic,
    server::{ServerHandle, ServerLifecycle},
};

pub mod chain;
pub mod report;
#[cfg(test)]
mod tests;

pub use chain::{CaseEntry, ExecutionChain, GroupEntry, TeardownEntry};
pub use report::{CaseOutcome, CaseReport, GroupOutcome, GroupReport};

/// Body of a test case.
pub type CaseBody = Box<dyn FnMut(&mut CaseContext) -> Result<(), BoxError>>;

/// One test case of a group.
pub struct TestCase {
    name: String,
    hooks: Vec<Arc<dyn CaseHook>>,
    body: CaseBody,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Create a case running `body`.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnMut(&mut CaseContext) -> Result<(), BoxError> + 'static,
    {
        Self {
            name: name.into(),
            hooks: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Declare a hook activated around this case only, after the group's
    /// hooks.
    #[must_use]
    pub fn hook(mut self, hook: Arc<dyn CaseHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Name of the case.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Hooks declared on this case.
    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn CaseHook>] { &self.hooks }
}

/// Position of a group in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupPhase {
    /// Nothing happened yet.
    Unstarted,
    /// Resolving the configuration.
    Resolving,
    /// Starting the server.
    Starting,
    /// Running cases; `completed` cases have finished.
    Running {
        /// Number of finished cases.
        completed: usize,
    },
    /// Stopping the server.
    Stopping,
    /// Done; no further case can run.
    Stopped,
}

/// Coordinates one group: one configuration, one server, hooks per case.
pub struct GroupRunner {
    descriptor: GroupDescriptor,
    resolver: ConfigurationResolver,
    lifecycle: ServerLifecycle,
    hooks: HookRegistry,
    chain: ExecutionChain,
    phase: GroupPhase,
    configuration: Option<Arc<dyn Configuration>>,
    server: Option<Arc<ServerHandle>>,
    pending_teardown: Option<ServerError>,
}

impl fmt::Debug for GroupRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRunner")
            .field("group", &self.descriptor.name())
            .field("phase", &self.phase)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl GroupRunner {
    /// Create a runner for `descriptor`, building servers with `factory`.
    #[must_use]
    pub fn new(descriptor: GroupDescriptor, factory: Arc<ServerFactory>) -> Self {
        let resolver = factory.resolver();
        let hooks = HookRegistry::new(descriptor.hooks().to_vec());
        let chain = ExecutionChain::build(&descriptor);
        Self {
            descriptor,
            resolver,
            lifecycle: ServerLifecycle::new(factory),
            hooks,
            chain,
            phase: GroupPhase::Unstarted,
            configuration: None,
            server: None,
            pending_teardown: None,
        }
    }

    /// Create a runner for the group type `G`.
    #[must_use]
    pub fn for_group<G: DescribeGroup>(factory: Arc<ServerFactory>) -> Self {
        Self::new(G::describe(), factory)
    }

    /// The group's descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &GroupDescriptor { &self.descriptor }

    /// The execution chain built for the group.
    #[must_use]
    pub fn chain(&self) -> &ExecutionChain { &self.chain }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> GroupPhase { self.phase }

    /// The resolved configuration, once resolution succeeded.
    #[must_use]
    pub fn configuration(&self) -> Option<&Arc<dyn Configuration>> { self.configuration.as_ref() }

    /// The group's server, once acquired.
    #[must_use]
    pub fn server(&self) -> Option<&Arc<ServerHandle>> { self.server.as_ref() }

    /// Group-start hook point: resolve, acquire and start the server.
    ///
    /// Calling it again while running returns the same server.
    ///
    /// # Errors
    ///
    /// Returns a [`GroupError`] if the configuration cannot be resolved, no
    /// backend supports it or the server fails to start. The group is then
    /// stopped and no case runs.
    pub fn start_group(&mut self) -> Result<Arc<ServerHandle>, GroupError> {
        match (self.phase, &self.server) {
            (GroupPhase::Running { .. }, Some(server)) => return Ok(Arc::clone(server)),
            (GroupPhase::Unstarted, _) => {}
            _ => {
                return Err(GroupError::NotStarted {
                    group: self.descriptor.name().to_owned(),
                });
            }
        }
        info!("starting group: group={}", self.descriptor.name());

        let entries = self.chain.group_entries().to_vec();
        for entry in entries {
            if let Err(e) = self.run_group_entry(entry) {
                error!(
                    "group aborted: group={}, step={entry:?}, error={e}",
                    self.descriptor.name()
                );
                self.abort();
                return Err(e);
            }
        }

        self.phase = GroupPhase::Running { completed: 0 };
        self.server.clone().ok_or_else(|| GroupError::NotStarted {
            group: self.descriptor.name().to_owned(),
        })
    }

    fn run_group_entry(&mut self, entry: GroupEntry) -> Result<(), GroupError> {
        match entry {
            GroupEntry::ResolveConfiguration => {
                self.phase = GroupPhase::Resolving;
                self.configuration = Some(self.resolver.resolve(&self.descriptor)?);
            }
            GroupEntry::AcquireServer => {
                let configuration = self.configuration.clone().ok_or_else(|| {
                    GroupError::NotStarted {
                        group: self.descriptor.name().to_owned(),
                    }
                })?;
                self.server = Some(self.lifecycle.acquire(&self.descriptor, configuration)?);
            }
            GroupEntry::StartServer => {
                self.phase = GroupPhase::Starting;
                self.lifecycle.start()?;
            }
        }
        Ok(())
    }

    fn abort(&mut self) { self.teardown(); }

    fn teardown(&mut self) {
        match self.chain.teardown() {
            TeardownEntry::StopServer => {
                if let Err(e) = self.lifecycle.stop() {
                    warn!(
                        "failed to stop server: group={}, error={e}",
                        self.descriptor.name()
                    );
                    self.pending_teardown = Some(e);
                }
            }
        }
        self.phase = GroupPhase::Stopped;
    }

    /// Per-case hook point: run `case` through the case entries.
    ///
    /// Cases requested while the group is not running are reported as
    /// skipped. A failing case never affects the following ones.
    pub fn run_case(&mut self, case: &mut TestCase) -> CaseReport {
        let (GroupPhase::Running { completed }, Some(server)) = (self.phase, &self.server) else {
            warn!(
                "group not running, skipping case: group={}, case={}",
                self.descriptor.name(),
                case.name
            );
            return CaseReport::skipped(&case.name);
        };
        let mut ctx = CaseContext::new(self.descriptor.name(), &case.name, Arc::clone(server));
        debug!(
            "running case: group={}, case={}",
            self.descriptor.name(),
            case.name
        );

        let mut failure: Option<CaseError> = None;
        let mut suppressed = Vec::new();
        let entries = self.chain.case_entries().to_vec();
        for entry in &entries {
            if failure.is_some() && !entry.is_guaranteed() {
                continue;
            }
            match entry {
                CaseEntry::AttachHooks { .. } => {
                    if let Err(e) = self.hooks.attach_for(&mut ctx, &case.hooks) {
                        failure = Some(e.into());
                    }
                }
                CaseEntry::Inject(point) => {
                    if let Err(e) = inject(&mut ctx, point) {
                        failure = Some(e.into());
                    }
                }
                CaseEntry::RunBody => {
                    if let Err(e) = run_body(&mut case.body, &mut ctx) {
                        failure = Some(e);
                    }
                }
                CaseEntry::DetachHooks => {
                    let closed = ctx.release_injected();
                    let detached = self.hooks.detach_for(&mut ctx);
                    suppressed.extend(closed.into_iter().map(CaseError::from));
                    suppressed.extend(detached.into_iter().map(CaseError::from));
                }
            }
        }

        let outcome = match failure {
            Some(error) => CaseOutcome::Failed(error),
            None if suppressed.is_empty() => CaseOutcome::Passed,
            None => CaseOutcome::Failed(suppressed.remove(0)),
        };
        self.phase = GroupPhase::Running {
            completed: completed + 1,
        };
        let report = CaseReport {
            name: case.name.clone(),
            outcome,
            suppressed,
        };
        info!("{report}");
        report
    }

    /// Group-end hook point: stop the server.
    ///
    /// Runs whatever happened before; calling it again does nothing. A stop
    /// failure recorded while aborting the group is returned here.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Stop`] if the server failed to stop.
    pub fn end_group(&mut self) -> Result<(), ServerError> {
        if self.phase != GroupPhase::Stopped {
            info!("ending group: group={}", self.descriptor.name());
            self.phase = GroupPhase::Stopping;
            self.teardown();
        }
        self.pending_teardown.take().map_or(Ok(()), Err)
    }

    /// Run every case of the group between start and end.
    pub fn run(mut self, cases: impl IntoIterator<Item = TestCase>) -> GroupReport {
        let group = self.descriptor.name().to_owned();
        let outcome = match self.start_group() {
            Ok(_) => GroupOutcome::Completed(
                cases
                    .into_iter()
                    .map(|mut case| self.run_case(&mut case))
                    .collect(),
            ),
            Err(error) => GroupOutcome::Aborted {
                error,
                skipped: cases.into_iter().map(|case| case.name).collect(),
            },
        };
        let teardown = self.end_group().err();
        let report = GroupReport {
            group,
            outcome,
            teardown,
        };
        info!("{report}");
        report
    }
}

impl Drop for GroupRunner {
    fn drop(&mut self) {
        if matches!(self.phase, GroupPhase::Unstarted | GroupPhase::Stopped) {
            return;
        }
        if let Err(e) = self.end_group() {
            warn!(
                "failed to end group on drop: group={}, error={e}",
                self.descriptor.name()
            );
        }
    }
}

fn inject(ctx: &mut CaseContext, point: &InjectionPoint) -> Result<(), InjectionError> {
    match point {
        InjectionPoint::Server { marker } => {
            let server = Arc::clone(ctx.shared_server());
            ctx.inject(marker.as_str(), Injected::Server(server));
        }
        InjectionPoint::Client { marker, factory } => {
            let client = factory
                .create(ctx.server(), ctx)
                .map_err(|source| InjectionError::ClientCreation {
                    marker: marker.clone(),
                    source,
                })?;
            ctx.inject(marker.as_str(), Injected::Client(client));
        }
    }
    Ok(())
}

fn run_body(body: &mut CaseBody, ctx: &mut CaseContext) -> Result<(), CaseError> {
    match catch_unwind(AssertUnwindSafe(|| body(ctx))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(CaseError::Failed(source)),
        Err(panic) => Err(CaseError::Panicked(format_panic(&panic).to_string())),
    }
}
