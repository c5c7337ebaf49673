//! Tests for [`GroupRunner`] and [`ExecutionChain`].

use std::sync::{
    Arc,
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use rstest::rstest;

use super::*;
use crate::{
    client::Client,
    context::CaseContext,
    error::{CaseError, GroupError, HookError, InjectionError, ServerError},
    server::{
        ServerState,
        test_util::{TestConfig, named_mock},
    },
};

fn factory(starts: usize, stops: usize, fail_start: bool) -> Arc<ServerFactory> {
    Arc::new(ServerFactory::new().register(move |_: Arc<TestConfig>| {
        let mut backend = named_mock();
        backend.expect_start().times(starts).returning(move || {
            if fail_start {
                Err("address in use".into())
            } else {
                Ok(())
            }
        });
        backend.expect_stop().times(stops).returning(|| Ok(()));
        backend
    }))
}

fn group() -> GroupDescriptor {
    GroupDescriptor::new("unit").configuration(Arc::new(TestConfig::default()))
}

#[derive(Default)]
struct Journal {
    events: Mutex<Vec<String>>,
}

impl Journal {
    fn push(&self, event: String) {
        self.events
            .lock()
            .expect("journal lock poisoned")
            .push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .expect("journal lock poisoned")
            .clone()
    }
}

struct JournalHook {
    label: &'static str,
    journal: Arc<Journal>,
    fail_detach: bool,
}

impl CaseHook for JournalHook {
    fn name(&self) -> &str { self.label }

    fn attach(&self, ctx: &mut CaseContext) -> Result<(), BoxError> {
        self.journal
            .push(format!("attach {} {}", self.label, ctx.case_name()));
        Ok(())
    }

    fn detach(&self, ctx: &mut CaseContext) -> Result<(), BoxError> {
        self.journal
            .push(format!("detach {} {}", self.label, ctx.case_name()));
        if self.fail_detach {
            Err("cleanup failed".into())
        } else {
            Ok(())
        }
    }
}

fn journal_hook(label: &'static str, journal: &Arc<Journal>) -> Arc<dyn CaseHook> {
    Arc::new(JournalHook {
        label,
        journal: Arc::clone(journal),
        fail_detach: false,
    })
}

#[rstest]
#[case(0, 0)]
#[case(2, 0)]
#[case(1, 3)]
fn chain_partitions_by_scope(#[case] hooks: usize, #[case] injections: usize) {
    let journal = Arc::new(Journal::default());
    let mut descriptor = group();
    for _ in 0..hooks {
        descriptor = descriptor.hook(journal_hook("h", &journal));
    }
    for n in 0..injections {
        descriptor = descriptor.inject_server(format!("server-{n}"));
    }
    let chain = ExecutionChain::build(&descriptor);

    assert_eq!(
        chain.group_entries(),
        [
            GroupEntry::ResolveConfiguration,
            GroupEntry::AcquireServer,
            GroupEntry::StartServer,
        ]
    );
    assert_eq!(chain.teardown(), TeardownEntry::StopServer);
    let case = chain.case_entries();
    assert_eq!(case.len(), injections + 3);
    assert!(matches!(case[0], CaseEntry::AttachHooks { declared } if declared == hooks));
    assert!(matches!(case[case.len() - 2], CaseEntry::RunBody));
    assert!(case[case.len() - 1].is_guaranteed());
    assert_eq!(case.iter().filter(|entry| entry.is_guaranteed()).count(), 1);
}

#[test]
fn phases_follow_group_lifecycle() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, false));
    assert_eq!(runner.phase(), GroupPhase::Unstarted);

    let server = runner.start_group().expect("start");
    assert_eq!(runner.phase(), GroupPhase::Running { completed: 0 });
    assert_eq!(server.state(), ServerState::Started);

    let report = runner.run_case(&mut TestCase::new("one", |_| Ok(())));
    assert!(report.is_passed());
    assert_eq!(runner.phase(), GroupPhase::Running { completed: 1 });

    runner.end_group().expect("end");
    assert_eq!(runner.phase(), GroupPhase::Stopped);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn start_group_twice_returns_same_server() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, false));
    let first = runner.start_group().expect("start");
    let second = runner.start_group().expect("start again");
    assert!(Arc::ptr_eq(&first, &second));
    runner.end_group().expect("end");
}

#[test]
fn start_failure_aborts_and_stops() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, true));
    let err = runner.start_group().expect_err("start fails");
    assert!(matches!(err, GroupError::Start(_)));
    assert_eq!(runner.phase(), GroupPhase::Stopped);

    let report = runner.run_case(&mut TestCase::new("never", |_| {
        panic!("body must not run")
    }));
    assert!(report.is_skipped());
    runner.end_group().expect("end");
}

#[test]
fn case_before_start_is_skipped() {
    let mut runner = GroupRunner::new(group(), factory(0, 0, false));
    let ran = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&ran);
    let report = runner.run_case(&mut TestCase::new("early", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    assert!(report.is_skipped());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn end_group_is_idempotent() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, false));
    runner.start_group().expect("start");
    runner.end_group().expect("end");
    runner.end_group().expect("second end");
    assert_eq!(runner.phase(), GroupPhase::Stopped);
}

#[test]
fn drop_ends_running_group() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, false));
    let server = runner.start_group().expect("start");
    drop(runner);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[test]
fn hooks_wrap_each_case_in_order() {
    let journal = Arc::new(Journal::default());
    let descriptor = group()
        .hook(journal_hook("outer", &journal))
        .hook(journal_hook("inner", &journal));
    let mut runner = GroupRunner::new(descriptor, factory(1, 1, false));
    runner.start_group().expect("start");

    let body_journal = Arc::clone(&journal);
    let mut case = TestCase::new("a", move |ctx| {
        body_journal.push(format!("body {}", ctx.case_name()));
        Ok(())
    })
    .hook(journal_hook("own", &journal));
    assert!(runner.run_case(&mut case).is_passed());
    runner.end_group().expect("end");

    assert_eq!(
        journal.events(),
        [
            "attach outer a",
            "attach inner a",
            "attach own a",
            "body a",
            "detach own a",
            "detach inner a",
            "detach outer a",
        ]
    );
}

#[test]
fn body_failure_still_detaches() {
    let journal = Arc::new(Journal::default());
    let descriptor = group().hook(journal_hook("h", &journal));
    let mut runner = GroupRunner::new(descriptor, factory(1, 1, false));
    runner.start_group().expect("start");

    let failed = runner.run_case(&mut TestCase::new("bad", |_| Err("assertion".into())));
    let panicked = runner.run_case(&mut TestCase::new("worse", |_| panic!("boom")));
    let passed = runner.run_case(&mut TestCase::new("good", |_| Ok(())));

    assert!(matches!(failed.error(), Some(CaseError::Failed(_))));
    assert!(matches!(panicked.error(), Some(CaseError::Panicked(msg)) if msg == "boom"));
    assert!(passed.is_passed());
    assert_eq!(journal.events().len(), 6);
    runner.end_group().expect("end");
}

#[test]
fn detach_failure_is_suppressed_behind_body_failure() {
    let journal = Arc::new(Journal::default());
    let hook: Arc<dyn CaseHook> = Arc::new(JournalHook {
        label: "leaky",
        journal: Arc::clone(&journal),
        fail_detach: true,
    });
    let mut runner = GroupRunner::new(group().hook(hook), factory(1, 1, false));
    runner.start_group().expect("start");

    let failed = runner.run_case(&mut TestCase::new("bad", |_| Err("assertion".into())));
    assert!(matches!(failed.error(), Some(CaseError::Failed(_))));
    assert!(matches!(
        failed.suppressed.as_slice(),
        [CaseError::Hook(HookError::Detach { hook, .. })] if hook == "leaky"
    ));

    let passed_body = runner.run_case(&mut TestCase::new("ok", |_| Ok(())));
    assert!(matches!(
        passed_body.error(),
        Some(CaseError::Hook(HookError::Detach { .. }))
    ));
    assert!(passed_body.suppressed.is_empty());
    runner.end_group().expect("end");
}

#[test]
fn server_is_injected_by_marker() {
    let descriptor = group().inject_server("server");
    let mut runner = GroupRunner::new(descriptor, factory(1, 1, false));
    let server = runner.start_group().expect("start");

    let expected = Arc::clone(&server);
    let report = runner.run_case(&mut TestCase::new("inject", move |ctx| {
        let injected = ctx.server_at("server").ok_or("server not injected")?;
        assert!(Arc::ptr_eq(injected, &expected));
        assert!(ctx.server_at("other").is_none());
        Ok(())
    }));
    assert!(report.is_passed(), "{report}");
    runner.end_group().expect("end");
}

#[test]
fn run_reports_every_case() {
    let runner = GroupRunner::new(group(), factory(1, 1, false));
    let report = runner.run([
        TestCase::new("first", |_| Ok(())),
        TestCase::new("second", |_| Err("nope".into())),
    ]);

    assert!(!report.is_aborted());
    assert_eq!(report.cases_run(), 2);
    assert_eq!(report.failures().count(), 1);
    assert!(!report.is_success());
    assert!(report.teardown.is_none());
}

#[test]
fn run_after_unsupported_configuration_skips_all() {
    let runner = GroupRunner::new(group(), Arc::new(ServerFactory::new()));
    let report = runner.run([TestCase::new("a", |_| Ok(())), TestCase::new("b", |_| Ok(()))]);

    match &report.outcome {
        GroupOutcome::Aborted { error, skipped } => {
            assert!(matches!(error, GroupError::Unsupported(_)));
            assert_eq!(skipped, &["a", "b"]);
        }
        GroupOutcome::Completed(_) => panic!("group should abort"),
    }
    assert_eq!(report.cases_run(), 0);
}

#[derive(Debug)]
struct StickyClient;

impl Client for StickyClient {
    fn close(&mut self) -> Result<(), BoxError> { Err("socket stuck".into()) }
}

fn sticky_client(_: &ServerHandle, _: &CaseContext) -> Result<Box<dyn Client>, BoxError> {
    Ok(Box::new(StickyClient))
}

#[test]
fn client_close_failure_is_reported_with_the_case() {
    let descriptor = group().inject_client("client", Arc::new(sticky_client));
    let mut runner = GroupRunner::new(descriptor, factory(1, 1, false));
    runner.start_group().expect("start");

    let failed = runner.run_case(&mut TestCase::new("bad", |_| Err("assertion".into())));
    assert!(matches!(failed.error(), Some(CaseError::Failed(_))));
    assert!(matches!(
        failed.suppressed.as_slice(),
        [CaseError::Injection(InjectionError::ClientClose { marker, .. })] if marker == "client"
    ));

    let passed_body = runner.run_case(&mut TestCase::new("ok", |_| Ok(())));
    assert!(matches!(
        passed_body.error(),
        Some(CaseError::Injection(InjectionError::ClientClose { .. }))
    ));
    assert!(passed_body.suppressed.is_empty());
    runner.end_group().expect("end");
}

#[test]
fn failed_start_is_not_retried() {
    let mut runner = GroupRunner::new(group(), factory(1, 1, true));
    assert!(matches!(
        runner.start_group(),
        Err(GroupError::Start(ServerError::Start { .. }))
    ));
    assert_eq!(runner.phase(), GroupPhase::Stopped);
    assert!(runner.start_group().is_err());
    runner.end_group().expect("end");
}
