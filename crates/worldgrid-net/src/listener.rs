//! Port-binding listener.
//!
//! [`WorldListener::bind`] acquires a port with [`bind_with_retry`] and
//! starts accepting immediately. The wire-encryption scheme and the command
//! handler are type parameters, so one binary can run several listener
//! flavors side by side.

use std::marker::PhantomData;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bind::{bind_with_retry, BindPolicy};
use crate::encryption::WireEncryption;
use crate::error::NetResult;
use crate::handler::CommandHandler;
use crate::session::{Session, SessionRegistry};

const READ_BUFFER_SIZE: usize = 4096;
/// Pause after a failed accept, so errors like EMFILE do not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Acceptor parameterized by wire scheme `E` and handler type `H`.
pub struct WorldListener<E, H> {
    _marker: PhantomData<fn() -> (E, H)>,
}

impl<E: WireEncryption, H: CommandHandler> WorldListener<E, H> {
    /// Bind `address:port` (moving up on collisions) and start accepting.
    pub async fn bind(
        address: IpAddr,
        port: u16,
        policy: &BindPolicy,
        context: H::Context,
        sessions: SessionRegistry,
    ) -> NetResult<ListenerHandle> {
        let (active_port, listener) = bind_with_retry(
            port,
            policy,
            |p| TcpListener::bind(SocketAddr::new(address, p)),
            |_| {},
        )
        .await?;

        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let accept = tokio::spawn(accept_loop::<E, H>(
            listener,
            context,
            sessions.clone(),
            shutdown_rx,
        ));

        if active_port != port {
            info!(configured = port, active = active_port, "listening on fallback port");
        }
        info!(%local_addr, "listener accepting connections");

        Ok(ListenerHandle {
            local_addr,
            shutdown_tx,
            accept,
            sessions,
        })
    }
}

/// Running listener. Dropping it stops accepting.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    accept: JoinHandle<()>,
    sessions: SessionRegistry,
}

impl ListenerHandle {
    /// The port actually bound, which may be above the configured one.
    pub fn active_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Stop accepting and close every session.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.accept.await;
        self.sessions.close_all().await;
        info!(local_addr = %self.local_addr, "listener stopped");
    }
}

async fn accept_loop<E: WireEncryption, H: CommandHandler>(
    listener: TcpListener,
    context: H::Context,
    sessions: SessionRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        if accept_backoff(&mut shutdown).await {
                            break;
                        }
                        continue;
                    }
                };

                let Some((session, outbound)) = sessions.open(peer).await else {
                    warn!(%peer, limit = sessions.limit(), "session limit reached, refusing connection");
                    continue;
                };

                let handler = H::create(&context, &session);
                tokio::spawn(serve_connection::<E, H>(
                    stream,
                    session,
                    outbound,
                    handler,
                    sessions.clone(),
                    shutdown.clone(),
                ));
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("accept loop stopped");
}

/// Wait out [`ACCEPT_ERROR_BACKOFF`]. Returns `true` if the listener was
/// stopped meanwhile.
async fn accept_backoff(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => false,
        _ = shutdown.changed() => true,
    }
}

async fn serve_connection<E: WireEncryption, H: CommandHandler>(
    stream: TcpStream,
    session: Session,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    mut handler: H,
    sessions: SessionRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = session.id();
    // The registry (and the handler, if it kept one) hold the only senders.
    drop(session);

    let (mut reader, mut writer) = stream.into_split();
    let mut scheme = E::default();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        tokio::select! {
            read = reader.read(&mut buf) => {
                let n = match read {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) => {
                        debug!(%id, error = %e, "read failed");
                        break;
                    }
                };
                let packets = match scheme.decrypt(&buf[..n]) {
                    Ok(packets) => packets,
                    Err(e) => {
                        warn!(%id, error = %e, "dropping connection");
                        break;
                    }
                };
                let mut failed = false;
                for packet in packets {
                    for reply in handler.handle(packet) {
                        if writer.write_all(&scheme.encrypt(&reply)).await.is_err() {
                            failed = true;
                        }
                    }
                }
                if failed {
                    break;
                }
            }
            next = outbound.recv() => {
                let Some(packet) = next else { break };
                if let Err(e) = writer.write_all(&scheme.encrypt(&packet)).await {
                    debug!(%id, error = %e, "write failed");
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    handler.on_disconnect();
    sessions.close(id).await;
}
