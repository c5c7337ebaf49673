//! Tests for lifecycle log output.

use std::sync::Arc;

use rstest::rstest;
use serial_test::serial;
use testbed::{GroupDescriptor, GroupRunner, TestCase};
use testbed_testing::{
    BackendProbe,
    FailingHook,
    LoggerHandle,
    ProbeConfiguration,
    logger,
    probe_factory,
};

fn descriptor(probe: &Arc<BackendProbe>) -> GroupDescriptor {
    GroupDescriptor::new("logged").configuration(Arc::new(ProbeConfiguration::new(Arc::clone(probe))))
}

#[rstest]
#[serial]
fn lifecycle_transitions_are_logged(mut logger: LoggerHandle) {
    let probe = Arc::new(BackendProbe::default());
    let report = GroupRunner::new(descriptor(&probe), probe_factory())
        .run([TestCase::new("only", |_| Ok(()))]);
    assert!(report.is_success(), "{report}");

    let messages = logger.messages();
    for expected in [
        "starting group: group=logged",
        "server started: backend=recording",
        "case only passed",
        "server stopped: backend=recording",
    ] {
        assert!(
            messages.iter().any(|message| message.contains(expected)),
            "missing {expected:?} in {messages:#?}"
        );
    }
}

#[rstest]
#[serial]
fn suppressed_detach_failure_is_logged(mut logger: LoggerHandle) {
    let probe = Arc::new(BackendProbe::default());
    let descriptor = descriptor(&probe).hook(Arc::new(FailingHook::on_detach()));
    let report = GroupRunner::new(descriptor, probe_factory())
        .run([TestCase::new("leaky", |_| Err("primary".into()))]);
    assert!(!report.is_success());

    assert!(logger.contains_all(&["hook failed to detach", "case=leaky", "hook=failing"]));
}

#[rstest]
#[serial]
fn aborted_group_is_logged(mut logger: LoggerHandle) {
    let probe = Arc::new(BackendProbe::default());
    let descriptor = GroupDescriptor::new("aborted")
        .configuration(Arc::new(ProbeConfiguration::new(probe).failing_start()));
    let report = GroupRunner::new(descriptor, probe_factory()).run([TestCase::new("a", |_| Ok(()))]);
    assert!(report.is_aborted());

    assert!(logger.contains_all(&["group aborted", "group=aborted"]));
}
