use std::net::SocketAddr;
use std::time::Duration;

use chatlink_proto::frame::{Frame, FrameCodec};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{Instrument, error, info, warn};

use crate::error::SyncError;
use crate::sync::handshake::HandshakeMachine;
use crate::sync::manager::{PROXY_LINK, SyncManager};
use crate::sync::router::SyncRouter;
use crate::telemetry::spans;

/// How long an inbound connection may take to send its hello.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between reconnect attempts to the proxy.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

type LinkFramed = Framed<TcpStream, FrameCodec>;

/// Link tuning shared by both ends.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub max_frame_len: usize,
    /// Backend names the proxy accepts; `None` accepts any.
    pub allowed_backends: Option<Vec<String>>,
}

/// Starts the proxy's inbound listener on an already bound socket.
pub fn start_listener(
    listener: TcpListener,
    router: SyncRouter,
    options: LinkOptions,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = run_listener(listener, router, options).await {
            error!(error = %e, "Link listener failed");
        }
    })
}

async fn run_listener(
    listener: TcpListener,
    router: SyncRouter,
    options: LinkOptions,
) -> Result<(), SyncError> {
    let local = listener.local_addr()?;
    info!(address = %local, "Link listener started");
    let mut shutdown_rx = router.manager().subscribe_shutdown();

    loop {
        tokio::select! {
            res = listener.accept() => {
                match res {
                    Ok((stream, peer_addr)) => {
                        info!(peer = %peer_addr, "Inbound link connection");
                        let router = router.clone();
                        let options = options.clone();
                        tokio::spawn(async move {
                            handle_inbound(stream, peer_addr, router, options).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept link connection");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Link listener stopping");
                break Ok(());
            }
        }
    }
}

async fn handle_inbound(
    stream: TcpStream,
    peer_addr: SocketAddr,
    router: SyncRouter,
    options: LinkOptions,
) {
    let mut framed = Framed::new(stream, FrameCodec::with_max_len(options.max_frame_len));
    let mut machine = HandshakeMachine::inbound(options.allowed_backends.clone());

    let first = match tokio::time::timeout(HANDSHAKE_TIMEOUT, framed.next()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) => {
            warn!(peer = %peer_addr, error = %e, "Link closed during handshake");
            return;
        }
        Ok(None) => {
            info!(peer = %peer_addr, "Link closed before hello");
            return;
        }
        Err(_) => {
            warn!(peer = %peer_addr, "Handshake timed out");
            return;
        }
    };

    let name = match machine.step(&first) {
        Ok(name) => name,
        Err(e) => {
            let e = SyncError::Handshake(e.to_string());
            warn!(peer = %peer_addr, error = %e, "Rejecting link");
            return;
        }
    };

    let manager = router.manager().clone();
    let rx = manager.register_link(&name, &peer_addr.to_string());
    let connected_at = manager.links.get(&name).map(|l| l.connected_at);
    let shutdown_rx = manager.subscribe_shutdown();

    let span = spans::link(&name, &peer_addr.to_string());
    run_link(framed, rx, &name, &router, shutdown_rx)
        .instrument(span)
        .await;

    if let Some(at) = connected_at {
        manager.remove_link(&name, at);
    }
}

/// Backend side: keep a link to the proxy open, reconnecting on loss.
pub fn connect_to_proxy(addr: String, router: SyncRouter, options: LinkOptions) -> JoinHandle<()> {
    tokio::spawn(async move {
        let manager = router.manager().clone();
        let mut shutdown_rx = manager.subscribe_shutdown();
        'reconnect: loop {
            info!(proxy = %addr, "Connecting to proxy");
            let stream = tokio::select! {
                res = TcpStream::connect(&addr) => match res {
                    Ok(s) => s,
                    Err(e) => {
                        error!(proxy = %addr, error = %e, "Failed to connect, retrying in {}s", RECONNECT_DELAY.as_secs());
                        tokio::select! {
                            _ = tokio::time::sleep(RECONNECT_DELAY) => continue 'reconnect,
                            _ = shutdown_rx.recv() => break 'reconnect,
                        }
                    }
                },
                _ = shutdown_rx.recv() => break 'reconnect,
            };

            let mut framed = Framed::new(stream, FrameCodec::with_max_len(options.max_frame_len));
            let hello = match Frame::hello(&manager.local_name) {
                Ok(f) => f,
                Err(e) => {
                    error!(error = %e, "Cannot build hello");
                    break 'reconnect;
                }
            };
            if let Err(e) = framed.send(hello).await {
                error!(proxy = %addr, error = %e, "Failed to send hello");
            } else {
                let rx = manager.register_link(PROXY_LINK, &addr);
                let connected_at = manager.links.get(PROXY_LINK).map(|l| l.connected_at);
                let span = spans::link(PROXY_LINK, &addr);
                let stopped = run_link(framed, rx, PROXY_LINK, &router, manager.subscribe_shutdown())
                    .instrument(span)
                    .await;
                if let Some(at) = connected_at {
                    manager.remove_link(PROXY_LINK, at);
                }
                if stopped == LinkEnd::Shutdown {
                    break 'reconnect;
                }
            }

            info!(proxy = %addr, "Reconnecting in {}s", RECONNECT_DELAY.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                _ = shutdown_rx.recv() => break 'reconnect,
            }
        }
        info!(proxy = %addr, "Proxy link stopped");
    })
}

#[derive(Debug, PartialEq, Eq)]
enum LinkEnd {
    Closed,
    Shutdown,
}

/// Pump one established link until either side closes it.
async fn run_link(
    mut framed: LinkFramed,
    mut rx: mpsc::Receiver<Frame>,
    name: &str,
    router: &SyncRouter,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> LinkEnd {
    loop {
        tokio::select! {
            out = rx.recv() => {
                match out {
                    Some(frame) => {
                        if let Err(e) = framed.send(frame).await {
                            error!(peer = %name, error = %e, "Failed to send frame");
                            return LinkEnd::Closed;
                        }
                    }
                    None => {
                        info!(peer = %name, "Link queue closed");
                        return LinkEnd::Closed;
                    }
                }
            }
            inbound = framed.next() => {
                match inbound {
                    Some(Ok(frame)) => {
                        if let Some(link) = router.manager().links.get(name) {
                            link.record_recv();
                        }
                        router.handle_frame(name, &frame);
                    }
                    Some(Err(e)) => {
                        warn!(peer = %name, error = %e, "Link stream error");
                        return LinkEnd::Closed;
                    }
                    None => {
                        info!(peer = %name, "Link closed by peer");
                        return LinkEnd::Closed;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!(peer = %name, "Link stopping due to shutdown");
                return LinkEnd::Shutdown;
            }
        }
    }
}
