//! Tests for server and client injection by marker, end to end over the
//! embedded TCP backend.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use testbed::{
    BoxError,
    CaseContext,
    GroupDescriptor,
    GroupRunner,
    ServerFactory,
    ServerHandle,
    TestCase,
    client::{Client, Interceptors},
    error::{CaseError, InjectionError},
    hooks::CaseHook,
    tcp::{TcpClient, TcpClientFactory, TcpConfiguration},
};
use testbed_testing::RecordingHook;

/// Installs interceptors marking requests and shouting responses.
struct Shout;

impl CaseHook for Shout {
    fn name(&self) -> &str { "shout" }

    fn attach(&self, ctx: &mut CaseContext) -> Result<(), BoxError> {
        let mut interceptors = Interceptors::default();
        interceptors
            .before_send(Arc::new(|bytes: &mut Vec<u8>| bytes.push(b'!')))
            .after_receive(Arc::new(|bytes: &mut Vec<u8>| bytes.make_ascii_uppercase()));
        ctx.extensions_mut().insert(interceptors);
        Ok(())
    }

    fn detach(&self, ctx: &mut CaseContext) -> Result<(), BoxError> {
        ctx.extensions_mut().remove::<Interceptors>();
        Ok(())
    }
}

fn echo_group() -> GroupDescriptor {
    GroupDescriptor::new("echo")
        .configuration(Arc::new(TcpConfiguration::default()))
        .inject_server("server")
        .inject_client("client", Arc::new(TcpClientFactory::new()))
}

fn echo(expected: &'static [u8]) -> impl FnMut(&mut CaseContext) -> Result<(), BoxError> {
    move |ctx| {
        let client = ctx.client::<TcpClient>("client").ok_or("client not injected")?;
        let server = ctx.server_at("server").ok_or("server not injected")?;
        assert_eq!(Some(client.addr()), server.local_addr());
        assert_eq!(client.request(b"ping")?, expected);
        Ok(())
    }
}

#[test]
fn client_talks_to_the_group_server() {
    let report = GroupRunner::new(echo_group(), Arc::new(ServerFactory::tcp())).run([
        TestCase::new("first", echo(b"ping")),
        TestCase::new("second", echo(b"ping")),
    ]);
    assert!(report.is_success(), "{report}");
}

#[test]
fn interceptors_apply_only_to_their_case() {
    let report = GroupRunner::new(echo_group(), Arc::new(ServerFactory::tcp())).run([
        TestCase::new("plain", echo(b"ping")),
        TestCase::new("shouted", echo(b"PING!")).hook(Arc::new(Shout)),
        TestCase::new("plain-again", echo(b"ping")),
    ]);
    assert!(report.is_success(), "{report}");
}

#[test]
fn default_tcp_configuration_serves_undeclared_group() {
    let descriptor = GroupDescriptor::new("defaults")
        .inject_client("client", Arc::new(TcpClientFactory::new()))
        .inject_server("server");
    let report = GroupRunner::new(descriptor, Arc::new(ServerFactory::tcp()))
        .run([TestCase::new("echo", echo(b"ping"))]);
    assert!(report.is_success(), "{report}");
}

#[derive(Debug)]
struct Tracked {
    closed: Arc<AtomicBool>,
}

impl Client for Tracked {
    fn close(&mut self) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn clients_are_created_per_case_and_closed_after() {
    let created = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicBool::new(false));
    let factory = {
        let created = Arc::clone(&created);
        let closed = Arc::clone(&closed);
        move |server: &ServerHandle, _: &CaseContext| -> Result<Box<dyn Client>, BoxError> {
            assert!(server.is_started());
            created.fetch_add(1, Ordering::SeqCst);
            closed.store(false, Ordering::SeqCst);
            Ok(Box::new(Tracked {
                closed: Arc::clone(&closed),
            }))
        }
    };
    let descriptor = GroupDescriptor::new("tracked")
        .configuration(Arc::new(TcpConfiguration::default()))
        .inject_client("primary", Arc::new(factory));

    let seen_closed = Arc::clone(&closed);
    let report = GroupRunner::new(descriptor, Arc::new(ServerFactory::tcp())).run(["a", "b"].map(
        |name| {
            let seen_closed = Arc::clone(&seen_closed);
            TestCase::new(name, move |ctx| {
                assert!(ctx.client::<Tracked>("primary").is_some());
                assert!(ctx.client::<TcpClient>("primary").is_none());
                assert!(ctx.client::<Tracked>("secondary").is_none());
                assert!(!seen_closed.load(Ordering::SeqCst));
                Ok(())
            })
        },
    ));

    assert!(report.is_success(), "{report}");
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert!(closed.load(Ordering::SeqCst));
}

#[test]
fn failing_client_factory_fails_case_and_releases_hooks() {
    let hook = Arc::new(RecordingHook::default());
    let descriptor = GroupDescriptor::new("broken-client")
        .configuration(Arc::new(TcpConfiguration::default()))
        .hook(hook.clone())
        .inject_client(
            "client",
            Arc::new(|_: &ServerHandle, _: &CaseContext| -> Result<Box<dyn Client>, BoxError> {
                Err("no route to host".into())
            }),
        );

    let report = GroupRunner::new(descriptor, Arc::new(ServerFactory::tcp()))
        .run([TestCase::new("a", |_| panic!("body must not run"))]);

    assert!(matches!(
        report.cases()[0].error(),
        Some(CaseError::Injection(InjectionError::ClientCreation { marker, .. })) if marker == "client"
    ));
    assert_eq!(hook.detaches(), 1);
}
