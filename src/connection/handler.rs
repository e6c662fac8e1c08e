//! Connection Handler Module
//!
//! This module handles individual client connections to zkv.
//! Each client gets its own handler task that runs in a loop,
//! reading compressed requests and sending compressed replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  AwaitingData: read a chunk  │
//!    │              │               │
//!    │              ▼               │
//!    │  Processing: decompress,     │
//!    │    parse, execute            │──── bad payload: drop, loop back
//!    │              │               │
//!    │              ▼               │
//!    │  Replying: compress, write   │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Zero-byte read / transport error → Closed
//! ```
//!
//! ## Framing
//!
//! One read is one message. The protocol has no length prefix, so the
//! handler never accumulates across reads: every chunk is decompressed on
//! its own and a chunk that is not a complete zlib stream is dropped.

use crate::commands::CommandHandler;
use crate::protocol::{codec, CodecError, COMPRESSION_FAILED};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Maximum number of bytes taken from the socket per message (4 KB)
pub const READ_CHUNK_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total messages answered
    pub messages_processed: AtomicU64,
    /// Messages dropped because they could not be decompressed
    pub messages_dropped: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn message_processed(&self) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so it can run on a `TcpStream` or any other
/// async byte stream.
pub struct ConnectionHandler<S> {
    /// The transport for this connection
    stream: S,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Holds the chunk currently being processed
    buffer: BytesMut,

    /// The command handler (shared state behind it)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The transport for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream,
            addr,
            buffer: BytesMut::with_capacity(READ_CHUNK_SIZE),
            command_handler,
            stats,
        }
    }

    /// Runs the connection until the peer disconnects or the transport fails.
    ///
    /// An orderly disconnect is reported as `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = match self.main_loop().await {
            Err(ConnectionError::ClientDisconnected) => Ok(()),
            other => other,
        };

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-process-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            self.read_message().await?;

            let Some(reply) = self.process_message() else {
                continue;
            };

            self.send_reply(&reply).await?;
        }
    }

    /// Reads the next chunk from the socket into the buffer.
    async fn read_message(&mut self) -> Result<(), ConnectionError> {
        self.buffer.clear();
        if self.buffer.capacity() < READ_CHUNK_SIZE {
            self.buffer.reserve(READ_CHUNK_SIZE);
        }

        let n = (&mut self.stream)
            .take(READ_CHUNK_SIZE as u64)
            .read_buf(&mut self.buffer)
            .await?;

        if n == 0 {
            return Err(ConnectionError::ClientDisconnected);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Turns the buffered chunk into compressed reply bytes.
    ///
    /// Returns `None` when the chunk should be dropped without a reply:
    /// it did not decompress, or it decompressed to nothing.
    fn process_message(&self) -> Option<Vec<u8>> {
        let decompressed = match codec::decompress(&self.buffer) {
            Ok(data) => data,
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Dropping undecodable message");
                self.stats.message_dropped();
                return None;
            }
        };

        if decompressed.is_empty() {
            trace!(client = %self.addr, "Ignoring empty message");
            return None;
        }

        let line = String::from_utf8_lossy(&decompressed);
        let reply = self.command_handler.execute(&line);
        self.stats.message_processed();

        let text = reply.to_text();
        Some(encode_reply(codec::compress(text.as_bytes()), self.addr))
    }

    /// Sends a reply to the client.
    async fn send_reply(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            bytes = bytes.len(),
            "Sent reply"
        );
        Ok(())
    }
}

/// Picks the bytes to send for a reply: the compressed text, or the raw
/// `"Compression failed\n"` notice when compression did not succeed.
fn encode_reply(compressed: Result<Vec<u8>, CodecError>, addr: SocketAddr) -> Vec<u8> {
    match compressed {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(client = %addr, error = %e, "Failed to compress reply");
            COMPRESSION_FAILED.as_bytes().to_vec()
        }
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. Errors are logged, never propagated.
///
/// # Arguments
///
/// * `stream` - The transport for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    if let Err(e) = handler.run().await {
        debug!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{compress, decompress};
    use crate::stats::StatsTracker;
    use crate::storage::KeyValueStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn create_command_handler() -> (CommandHandler, Arc<KeyValueStore>, Arc<StatsTracker>) {
        let store = Arc::new(KeyValueStore::new("unused.json"));
        let stats = Arc::new(StatsTracker::new());
        let handler = CommandHandler::new(Arc::clone(&store), Arc::clone(&stats));
        (handler, store, stats)
    }

    async fn create_test_server() -> (SocketAddr, Arc<KeyValueStore>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (command_handler, store, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = command_handler.clone();
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, store, stats)
    }

    async fn roundtrip(client: &mut TcpStream, request: &str) -> String {
        client
            .write_all(&compress(request.as_bytes()).unwrap())
            .await
            .unwrap();

        let mut buf = vec![0u8; 4096];
        let n = client.read(&mut buf).await.unwrap();
        String::from_utf8(decompress(&buf[..n]).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_mock_set_get() {
        let (command_handler, _, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let stream = Builder::new()
            .read(&compress(b"$set color=blue").unwrap())
            .write(&compress(b"Set color=blue\nreads=0\nwrites=1\n").unwrap())
            .read(&compress(b"$get color").unwrap())
            .write(&compress(b"color=blue\nreads=1\nwrites=1\n").unwrap())
            .build();

        let handler = ConnectionHandler::new(stream, test_addr(), command_handler, Arc::clone(&stats));
        tokio_test::assert_ok!(handler.run().await);

        assert_eq!(stats.messages_processed.load(Ordering::Relaxed), 2);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_mock_garbage_is_dropped() {
        let (command_handler, store, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        // The garbage chunk gets no reply; the next request is still served
        let stream = Builder::new()
            .read(b"not compressed at all")
            .read(&compress(b"$set k=v").unwrap())
            .write(&compress(b"Set k=v\nreads=0\nwrites=1\n").unwrap())
            .build();

        let handler = ConnectionHandler::new(stream, test_addr(), command_handler, Arc::clone(&stats));
        tokio_test::assert_ok!(handler.run().await);

        assert_eq!(stats.messages_dropped.load(Ordering::Relaxed), 1);
        assert_eq!(stats.messages_processed.load(Ordering::Relaxed), 1);
        assert_eq!(store.get("k"), "v");
    }

    #[tokio::test]
    async fn test_mock_empty_message_ignored() {
        let (command_handler, _, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let stream = Builder::new()
            .read(&compress(b"").unwrap())
            .read(&compress(b"$hello").unwrap())
            .write(&compress(b"Unknown command\n").unwrap())
            .build();

        let handler = ConnectionHandler::new(stream, test_addr(), command_handler, stats);
        tokio_test::assert_ok!(handler.run().await);
    }

    #[tokio::test]
    async fn test_mock_highly_compressible_set() {
        let (command_handler, store, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let value = "a".repeat(300);
        let request = format!("$set k={}", value);
        let reply = format!("Set k={}\nreads=0\nwrites=1\n", value);

        let stream = Builder::new()
            .read(&compress(request.as_bytes()).unwrap())
            .write(&compress(reply.as_bytes()).unwrap())
            .build();

        let handler = ConnectionHandler::new(stream, test_addr(), command_handler, Arc::clone(&stats));
        tokio_test::assert_ok!(handler.run().await);

        assert_eq!(stats.messages_dropped.load(Ordering::Relaxed), 0);
        assert_eq!(stats.messages_processed.load(Ordering::Relaxed), 1);
        assert_eq!(store.get("k"), value);
    }

    #[test]
    fn test_encode_reply_passes_compressed_bytes() {
        let compressed = compress(b"Unknown command\n").unwrap();
        assert_eq!(encode_reply(Ok(compressed.clone()), test_addr()), compressed);
    }

    #[test]
    fn test_encode_reply_substitutes_on_compression_failure() {
        let failure = CodecError::Compression(std::io::Error::new(
            std::io::ErrorKind::Other,
            "encoder fault",
        ));

        let bytes = encode_reply(Err(failure), test_addr());
        assert_eq!(bytes, COMPRESSION_FAILED.as_bytes());
        assert_eq!(bytes, b"Compression failed\n");
    }

    #[tokio::test]
    async fn test_mock_write_error_closes() {
        let (command_handler, _, _) = create_command_handler();
        let stats = Arc::new(ConnectionStats::new());

        let stream = Builder::new()
            .read(&compress(b"$get k").unwrap())
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer went away",
            ))
            .build();

        let handler = ConnectionHandler::new(stream, test_addr(), command_handler, Arc::clone(&stats));
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::IoError(_))));
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        assert_eq!(
            roundtrip(&mut client, "$set color=blue").await,
            "Set color=blue\nreads=0\nwrites=1\n"
        );
        assert_eq!(
            roundtrip(&mut client, "$get color").await,
            "color=blue\nreads=1\nwrites=1\n"
        );
    }

    #[tokio::test]
    async fn test_protocol_errors_keep_connection_open() {
        let (addr, store, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        assert_eq!(
            roundtrip(&mut client, "$set nokeyequalssign").await,
            "Invalid $set format\n"
        );
        assert_eq!(roundtrip(&mut client, "$flush").await, "Unknown command\n");
        assert_eq!(
            roundtrip(&mut client, "$get missing").await,
            "missing=\nreads=1\nwrites=0\n"
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_disjoint_keys() {
        let (addr, store, _) = create_test_server().await;

        let mut tasks = Vec::new();
        for key in ["a", "b", "c", "d"] {
            tasks.push(tokio::spawn(async move {
                let mut client = TcpStream::connect(addr).await.unwrap();
                for i in 0..20 {
                    let reply = roundtrip(&mut client, &format!("$set {}={}", key, i)).await;
                    assert_eq!(
                        reply,
                        format!("Set {}={}\nreads=0\nwrites={}\n", key, i, i + 1)
                    );
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        for key in ["a", "b", "c", "d"] {
            assert_eq!(store.get(key), "19");
        }
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        roundtrip(&mut client, "$get x").await;

        assert!(stats.messages_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
