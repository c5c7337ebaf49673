//! Tests for the embedded TCP backend.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use futures::FutureExt;
use rstest::{fixture, rstest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::*;
use crate::config::ServerSettings;

#[fixture]
fn server() -> TcpServer {
    // Tests start the server themselves.
    TcpServer::new(Arc::new(TcpConfiguration::default()))
}

fn client_for(server: &TcpServer) -> TcpClient {
    let addr = server.local_addr().expect("server should be listening");
    TcpClient::with_addr(addr)
        .expect("client runtime")
        .timeout(Duration::from_secs(2))
}

#[rstest]
fn echoes_payload_until_half_close(mut server: TcpServer) {
    server.start().expect("start");
    let client = client_for(&server);
    assert_eq!(client.request(b"ping").expect("exchange"), b"ping");
    assert_eq!(client.request(b"").expect("empty exchange"), b"");
    server.stop().expect("stop");
}

#[rstest]
fn local_addr_only_while_running(mut server: TcpServer) {
    assert!(server.local_addr().is_none());
    server.start().expect("start");
    let addr = server.local_addr().expect("bound address");
    assert_ne!(addr.port(), 0);
    server.stop().expect("stop");
    assert!(server.local_addr().is_none());
}

#[rstest]
fn stop_without_start_is_noop(mut server: TcpServer) {
    server.stop().expect("stop of unstarted server");
    server.stop().expect("second stop");
}

#[rstest]
fn start_twice_keeps_listener(mut server: TcpServer) {
    server.start().expect("start");
    let addr = server.local_addr();
    server.start().expect("second start");
    assert_eq!(server.local_addr(), addr);
    server.stop().expect("stop");
}

#[test]
fn bind_conflict_is_start_error() {
    let taken = StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind probe listener");
    let port = taken.local_addr().expect("probe address").port();
    let config = TcpConfiguration::default().with_settings(ServerSettings::default().port(port));
    let mut server = TcpServer::new(Arc::new(config));

    assert!(server.start().is_err());
    assert!(server.local_addr().is_none());
    server.stop().expect("stop after failed start");
}

#[test]
fn custom_service_replaces_echo() {
    let config = TcpConfiguration::default().service(|mut stream| {
        async move {
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await?;
            request.reverse();
            stream.write_all(&request).await?;
            stream.shutdown().await
        }
        .boxed()
    });
    let mut server = TcpServer::new(Arc::new(config));
    server.start().expect("start");

    let client = client_for(&server);
    assert_eq!(client.request(b"abc").expect("exchange"), b"cba");
    server.stop().expect("stop");
}

#[test]
fn panicking_service_does_not_stop_server() {
    let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let config = TcpConfiguration::default()
        .workers(2)
        .service(move |mut stream| {
            let first = seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0;
            async move {
                assert!(!first, "first connection panics");
                stream.write_all(b"ok").await?;
                stream.shutdown().await
            }
            .boxed()
        });
    let mut server = TcpServer::new(Arc::new(config));
    server.start().expect("start");

    let client = client_for(&server);
    assert!(client.request(b"boom").map_or(true, |bytes| bytes.is_empty()));
    assert_eq!(client.request(b"again").expect("second exchange"), b"ok");
    server.stop().expect("stop");
}

#[test]
fn stop_closes_idle_connections() {
    let config = TcpConfiguration::default().service(|mut stream| {
        async move {
            let mut buf = [0u8; 1];
            let _ = stream.read(&mut buf).await?;
            Ok::<_, io::Error>(())
        }
        .boxed()
    });
    let mut server = TcpServer::new(Arc::new(config));
    server.start().expect("start");
    let addr: SocketAddr = server.local_addr().expect("address");
    let _idle = std::net::TcpStream::connect(addr).expect("connect");

    server.stop().expect("stop with idle connection");
}

#[rstest]
#[case(0, 1)]
#[case(1, 1)]
#[case(4, 4)]
fn worker_count_is_at_least_one(#[case] requested: usize, #[case] expected: usize) {
    assert_eq!(
        TcpConfiguration::default().workers(requested).worker_count(),
        expected
    );
}

#[rstest]
#[case(Duration::from_millis(10), Duration::from_millis(20))]
#[case(Duration::from_millis(600), Duration::from_secs(1))]
#[case(Duration::from_secs(1), Duration::from_secs(1))]
fn backoff_doubles_up_to_max(#[case] delay: Duration, #[case] expected: Duration) {
    assert_eq!(BackoffConfig::default().next_delay(delay), expected);
}

#[test]
fn accept_backoff_is_normalized() {
    let config = TcpConfiguration::default().accept_backoff(BackoffConfig {
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    });
    assert_eq!(
        config.backoff_config(),
        BackoffConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        }
    );
}
