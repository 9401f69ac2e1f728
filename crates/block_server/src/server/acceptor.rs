//! TCP acceptor.
//!
//! Binds every configured endpoint and runs one accept loop per listener.
//! Each accepted stream is served by its own task, which fires the
//! handler's callbacks strictly in the order accept, receive*, disconnect.
//! That per-connection ordering is what guarantees a disconnect is never
//! observed before the matching accept has completed.

use crate::connection::{Connection, ConnectionId};
use crate::error::ServerError;
use futures::stream::{FuturesUnordered, StreamExt};
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Upper bound on the per-connection read buffer.
const READ_BUFFER_LIMIT: usize = 64 * 1024;

/// Callbacks fired by the acceptor for every connection.
pub trait AcceptHandler: Send + Sync + 'static {
    /// A connection was accepted. `Ok(false)` refuses it: the connection is
    /// closed and no further callbacks fire for it.
    fn on_accept(&self, connection: Arc<dyn Connection>) -> Result<bool, ServerError>;

    /// Bytes arrived on an accepted connection.
    fn on_receive(&self, connection: &Arc<dyn Connection>, data: &[u8]);

    /// An accepted connection closed. Fires at most once per connection.
    fn on_disconnect(&self, connection: &Arc<dyn Connection>, reason: Option<&str>) -> Result<(), ServerError>;
}

enum Outgoing {
    Data(Vec<u8>),
    Close,
}

/// [`Connection`] backed by a tokio TCP stream.
pub struct TcpConnection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closing: watch::Sender<Option<String>>,
}

impl fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}

impl Connection for TcpConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn send(&self, data: Vec<u8>) -> Result<(), ServerError> {
        self.outgoing
            .send(Outgoing::Data(data))
            .map_err(|_| ServerError::Network(format!("Connection {} is closed", self.id)))
    }

    fn disconnect(&self, reason: &str) {
        // The first reason given wins.
        self.closing.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason.to_string());
                true
            } else {
                false
            }
        });
    }
}

/// Listens on a set of endpoints and serves accepted connections.
pub struct TcpAcceptor {
    listeners: Vec<TcpListener>,
    max_bytes: usize,
    next_id: Arc<AtomicUsize>,
}

impl TcpAcceptor {
    /// Binds every endpoint. Must be called from within a tokio runtime.
    ///
    /// IPv6 endpoints are bound v6-only so that the IPv4 and IPv6 wildcards
    /// can share a port.
    pub fn bind(endpoints: &[SocketAddr], max_bytes: usize) -> Result<Self, ServerError> {
        let mut listeners = Vec::with_capacity(endpoints.len());

        for endpoint in endpoints {
            let listener = Self::bind_listener(*endpoint)?;
            info!("✅ Listener bound on {}", listener.local_addr().unwrap_or(*endpoint));
            listeners.push(listener);
        }

        Ok(Self {
            listeners,
            max_bytes: max_bytes.max(1),
            next_id: Arc::new(AtomicUsize::new(1)),
        })
    }

    fn bind_listener(endpoint: SocketAddr) -> Result<TcpListener, ServerError> {
        let domain = if endpoint.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed for {endpoint}: {e}")))?;

        if endpoint.is_ipv6() {
            socket
                .set_only_v6(true)
                .map_err(|e| ServerError::Network(format!("Failed to set IPV6_V6ONLY on {endpoint}: {e}")))?;
        }
        socket.set_reuse_address(true).ok();

        socket
            .bind(&endpoint.into())
            .map_err(|e| ServerError::Network(format!("Bind failed for {endpoint}: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::Network(format!("Listen failed for {endpoint}: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        std_listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to make {endpoint} non-blocking: {e}")))?;

        TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed for {endpoint}: {e}")))
    }

    /// Addresses actually bound, in endpoint order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect()
    }

    /// Accepts connections until `shutdown` becomes `true`.
    ///
    /// Open connections are closed with the reason "Server shutting down"
    /// when shutdown is requested.
    pub async fn run<H: AcceptHandler>(self, handler: Arc<H>, shutdown: watch::Receiver<bool>) {
        let max_bytes = self.max_bytes;
        let mut accept_loops = self
            .listeners
            .into_iter()
            .map(|listener| {
                let handler = handler.clone();
                let next_id = self.next_id.clone();
                let shutdown = shutdown.clone();
                Self::accept_loop(listener, handler, next_id, max_bytes, shutdown)
            })
            .collect::<FuturesUnordered<_>>();

        while accept_loops.next().await.is_some() {}
        debug!("All accept loops stopped");
    }

    async fn accept_loop<H: AcceptHandler>(
        listener: TcpListener,
        handler: Arc<H>,
        next_id: Arc<AtomicUsize>,
        max_bytes: usize,
        shutdown: watch::Receiver<bool>,
    ) {
        // Separate receiver for the stop arm; `shutdown` is only cloned into connections.
        let mut stop = shutdown.clone();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        let handler = handler.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(Self::serve(stream, addr, id, handler, max_bytes, shutdown));
                    }
                    Err(e) => {
                        // Per-connection failures (e.g. reset before accept) must not stop the loop.
                        warn!("Failed to accept connection: {}", e);
                    }
                },
                _ = stop.wait_for(|stop| *stop) => break,
            }
        }
    }

    async fn serve<H: AcceptHandler>(
        stream: TcpStream,
        addr: SocketAddr,
        id: ConnectionId,
        handler: Arc<H>,
        max_bytes: usize,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let _ = stream.set_nodelay(true);
        let (mut reader, writer) = stream.into_split();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (closing, mut closing_rx) = watch::channel(None);

        let writer_task = tokio::spawn(Self::write_loop(writer, outgoing_rx));
        let close_writer = outgoing.clone();
        let connection: Arc<dyn Connection> = Arc::new(TcpConnection {
            id,
            remote_addr: addr,
            outgoing,
            closing,
        });

        match handler.on_accept(connection.clone()) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Connection {} from {} refused", id, addr);
                let _ = close_writer.send(Outgoing::Close);
                let _ = writer_task.await;
                return;
            }
            Err(e) => {
                error!("Accept of {} failed: {}", addr, e);
                let _ = close_writer.send(Outgoing::Close);
                return;
            }
        }

        let mut buffer = vec![0u8; max_bytes.min(READ_BUFFER_LIMIT)];
        let reason = loop {
            tokio::select! {
                read = reader.read(&mut buffer) => match read {
                    Ok(0) => break None,
                    Ok(n) => handler.on_receive(&connection, &buffer[..n]),
                    Err(e) => break Some(e.to_string()),
                },
                _ = closing_rx.changed() => break closing_rx.borrow().clone(),
                _ = shutdown.wait_for(|stop| *stop) => break Some("Server shutting down".to_string()),
            }
        };

        let _ = close_writer.send(Outgoing::Close);
        if let Err(e) = handler.on_disconnect(&connection, reason.as_deref()) {
            error!("Disconnect of {} failed: {}", addr, e);
        }
        let _ = writer_task.await;
    }

    async fn write_loop(mut writer: OwnedWriteHalf, mut outgoing: mpsc::UnboundedReceiver<Outgoing>) {
        while let Some(message) = outgoing.recv().await {
            match message {
                Outgoing::Data(bytes) => {
                    if let Err(e) = writer.write_all(&bytes).await {
                        debug!("Write failed, dropping outgoing data: {}", e);
                        break;
                    }
                }
                Outgoing::Close => break,
            }
        }
        let _ = writer.shutdown().await;
    }
}

impl fmt::Debug for TcpAcceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpAcceptor")
            .field("local_addrs", &self.local_addrs())
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
