//! Accept loop of the TCP backend.

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{debug, warn};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::oneshot,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{BackoffConfig, ConnectionService};
use crate::panic::format_panic;

pub(super) struct AcceptLoop {
    pub listener: Arc<TcpListener>,
    pub service: ConnectionService,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
    pub ready: oneshot::Sender<()>,
}

/// Accept connections until `shutdown` is cancelled.
///
/// Every accepted stream is served by `service` in its own tracked task.
/// Failures to accept back off exponentially.
pub(super) async fn accept_loop(options: AcceptLoop) {
    let AcceptLoop {
        listener,
        service,
        shutdown,
        tracker,
        backoff,
        ready,
    } = options;
    let backoff = backoff.normalized();
    if ready.send(()).is_err() {
        warn!("failed to send readiness signal: receiver dropped");
    }
    let mut delay = backoff.initial_delay;
    loop {
        delay = match accept_iteration(&listener, &shutdown, delay).await {
            Accepted::Shutdown => break,
            Accepted::Stream(stream, peer_addr) => {
                spawn_connection_task(stream, peer_addr, &service, &shutdown, &tracker);
                backoff.initial_delay
            }
            Accepted::Failed => backoff.next_delay(delay),
        };
    }
    debug!("accept loop stopped: local_addr={:?}", listener.local_addr().ok());
}

enum Accepted {
    Stream(TcpStream, SocketAddr),
    Failed,
    Shutdown,
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
async fn accept_iteration(
    listener: &TcpListener,
    shutdown: &CancellationToken,
    delay: Duration,
) -> Accepted {
    select! {
        biased;

        () = shutdown.cancelled() => Accepted::Shutdown,
        res = listener.accept() => match res {
            Ok((stream, peer_addr)) => Accepted::Stream(stream, peer_addr),
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                sleep(delay).await;
                Accepted::Failed
            }
        },
    }
}

/// Spawn a task serving one connection, logging and discarding any panic.
#[expect(
    clippy::integer_division_remainder_used,
    reason = "tokio::select! expands to modulus internally"
)]
fn spawn_connection_task(
    stream: TcpStream,
    peer_addr: SocketAddr,
    service: &ConnectionService,
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
) {
    let service = Arc::clone(service);
    let shutdown = shutdown.clone();
    tracker.spawn(async move {
        let served = AssertUnwindSafe(async move { service(stream).await }).catch_unwind();
        let result = select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("connection closed on shutdown: peer_addr={peer_addr}");
                return;
            }
            result = served => result,
        };
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("connection service failed: error={e}, peer_addr={peer_addr}"),
            Err(panic) => {
                let panic_msg = format_panic(&panic);
                tracing::error!(panic = %panic_msg, %peer_addr, "connection task panicked");
            }
        }
    });
}
