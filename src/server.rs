//! TCP server for Kafka client connections.
//!
//! Accepts connections, reads length-prefixed requests and writes back the
//! responses produced by the handlers. One task per connection; connections
//! share no state.

use crate::config::Config;
use crate::handlers;
use crate::protocol::frame;
use crate::protocol::{DecodeError, FrameError, Request};
use bytes::BytesMut;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

/// Read buffer size
const BUFFER_SIZE: usize = 16 * 1024;

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Why a connection ended abnormally
#[derive(Debug)]
pub enum ConnectionError {
    Io(std::io::Error),
    Frame(FrameError),
    Decode(DecodeError),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::Io(e) => write!(f, "I/O error: {}", e),
            ConnectionError::Frame(e) => write!(f, "Framing error: {}", e),
            ConnectionError::Decode(e) => write!(f, "Malformed request: {}", e),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<std::io::Error> for ConnectionError {
    fn from(e: std::io::Error) -> Self {
        ConnectionError::Io(e)
    }
}

impl From<FrameError> for ConnectionError {
    fn from(e: FrameError) -> Self {
        ConnectionError::Frame(e)
    }
}

impl From<DecodeError> for ConnectionError {
    fn from(e: DecodeError) -> Self {
        ConnectionError::Decode(e)
    }
}

/// Server instance
pub struct Server {
    config: Config,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        Server {
            config,
            connection_limit,
        }
    }

    /// Bind the configured address.
    pub fn bind(&self) -> std::io::Result<TcpListener> {
        let addr: SocketAddr = self
            .config
            .listen_address()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        create_listener(addr)
    }

    /// Bind and serve until `shutdown` completes.
    pub async fn run(
        &self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = self.bind()?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` completes, then
    /// stop every connection task and wait for them to finish.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            address = %listener.local_addr()?,
            max_connections = self.config.max_connections,
            max_frame_size = self.config.max_frame_size,
            "Server listening"
        );

        tokio::pin!(shutdown);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.connection_limit.clone().acquire_owned() => permit?,
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "New connection");

                    let max_frame_size = self.config.max_frame_size;
                    let stop = stop_rx.clone();

                    connections.spawn(async move {
                        match handle_connection(stream, max_frame_size, stop).await {
                            Ok(()) => debug!(peer = %addr, "Connection closed"),
                            Err(e) => debug!(peer = %addr, error = %e, "Connection error"),
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }

            // Reap finished connections
            while connections.try_join_next().is_some() {}
        }

        info!(active = connections.len(), "Shutting down");
        // Receivers treat a send as the stop signal
        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}
        info!("Server stopped");

        Ok(())
    }
}

/// Build a listening socket with address reuse and an explicit backlog.
fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    TcpListener::from_std(socket.into())
}

/// Handle a single client connection.
///
/// Requests are answered strictly in arrival order. Returns `Ok` on clean
/// EOF between frames or when `stop` fires.
pub async fn handle_connection<S>(
    mut stream: S,
    max_frame_size: usize,
    mut stop: watch::Receiver<bool>,
) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    let mut out = BytesMut::with_capacity(BUFFER_SIZE);

    loop {
        // Drain every complete frame before reading again
        while let Some(body) = frame::read_frame(&mut buffer, max_frame_size).map_err(|e| {
            warn!(error = %e, "Rejecting frame");
            e
        })? {
            let request = Request::parse(body)?;
            debug!(
                api_key = request.header.api_key,
                api_version = request.header.api_version,
                correlation_id = request.header.correlation_id,
                payload_len = request.payload.len(),
                "Request"
            );

            let response = handlers::dispatch(&request)?;

            out.clear();
            frame::write_frame(&mut out, &response);
            stream.write_all(&out).await?;
            stream.flush().await?;
        }

        let n = tokio::select! {
            read = stream.read_buf(&mut buffer) => read?,
            _ = stop.changed() => {
                trace!("Connection stopped by shutdown");
                return Ok(());
            }
        };

        if n == 0 {
            if buffer.is_empty() {
                trace!("Connection closed by client");
                return Ok(());
            }
            return Err(FrameError::Truncated {
                buffered: buffer.len(),
            }
            .into());
        }
    }
}
