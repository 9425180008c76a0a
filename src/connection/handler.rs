//! Connection Handler Module
//!
//! This module handles individual client connections.
//! Each client gets its own handler task that runs in a loop,
//! reading commands and sending responses.
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
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode buffered frames  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute, write reply    │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. End of input / protocol error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. This is important
//! because TCP is a stream protocol - we might receive partial commands,
//! or multiple commands in a single read.

use crate::commands::CommandHandler;
use crate::protocol::{Command, DecodeError, FrameDecoder, RespValue};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
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

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// This struct manages the read buffer, decoding, and response sending
/// for one connected client. It works over any byte stream, which is a
/// `TcpStream` in the server and an in-memory stream in tests.
pub struct ConnectionHandler<S> {
    /// The client stream, buffered on the write side
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Largest amount of unparsed data we hold before giving up
    max_buffer_size: usize,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Frame decoder
    decoder: FrameDecoder,

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
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    /// * `max_buffer_size` - Limit for buffered, not yet decodable input
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        max_buffer_size: usize,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            max_buffer_size,
            command_handler,
            decoder: FrameDecoder::new(),
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads commands from the client, executes them,
    /// and sends back responses until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed with error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main decode-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let mut replied = false;
            while let Some(command) = self.try_decode_command().await? {
                debug!(client = %self.addr, command = %command, "Received command");

                let response = self.command_handler.execute(command);
                self.stats.command_processed();

                debug!(client = %self.addr, response = %response, "Sending response");
                self.write_response(&response).await?;
                replied = true;
            }

            if replied {
                self.stream.flush().await?;
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Attempts to decode a command from the buffer.
    ///
    /// A malformed frame is answered with a protocol error reply before
    /// the error is returned, and nothing from it is executed.
    async fn try_decode_command(&mut self) -> Result<Option<Command>, ConnectionError> {
        match self.decoder.decode(&self.buffer) {
            Ok(Some((command, consumed))) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded command"
                );
                Ok(Some(command))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete command, need more data"
                );
                Ok(None)
            }
            Err(e) => Err(self.reject(e).await),
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns `false` on a clean end of input, i.e. when the peer closed
    /// the stream between frames.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= self.max_buffer_size {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            let reply = RespValue::error(format!(
                "ERR Protocol error: {}",
                ConnectionError::BufferFull
            ));
            if let Err(io_err) = self.send_final(&reply).await {
                debug!(client = %self.addr, error = %io_err, "Could not send buffer limit error");
            }
            return Err(ConnectionError::BufferFull);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Ok(false);
            }
            // Partial frame in buffer
            return Err(self.reject(DecodeError::UnexpectedEof).await);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    /// Writes a response into the outgoing buffer.
    async fn write_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Queued response");
        Ok(())
    }

    /// Reports a decode error to the client and turns it into the error
    /// that ends the connection.
    async fn reject(&mut self, error: DecodeError) -> ConnectionError {
        warn!(client = %self.addr, error = %error, "Protocol error");

        let reply = RespValue::error(format!("ERR Protocol error: {}", error));
        // The peer may already be gone; the decode error is what matters
        if let Err(io_err) = self.send_final(&reply).await {
            debug!(client = %self.addr, error = %io_err, "Could not send protocol error");
        }

        ConnectionError::Decode(error)
    }

    async fn send_final(&mut self, reply: &RespValue) -> std::io::Result<()> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request frame, including a stream cut mid-frame
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Buffer size limit exceeded
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. The outcome is logged by the handler.
///
/// # Arguments
///
/// * `stream` - The byte stream for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
/// * `max_buffer_size` - Limit for buffered, not yet decodable input
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    max_buffer_size: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, max_buffer_size);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    const MAX_BUFFER: usize = 64 * 1024;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn create_handler<S>(stream: S) -> (ConnectionHandler<S>, Arc<ConnectionStats>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let stats = Arc::new(ConnectionStats::new());
        let commands = CommandHandler::new(Arc::new(Store::new()));
        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            commands,
            Arc::clone(&stats),
            MAX_BUFFER,
        );
        (handler, stats)
    }

    async fn create_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    stats,
                    MAX_BUFFER,
                ));
            }
        });

        (addr, storage, stats)
    }

    async fn read_exactly(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            client.read_exact(&mut buf),
        )
        .await
        .unwrap()
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_ping_then_clean_eof() {
        let stream = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, stats) = create_handler(stream);

        handler.run().await.unwrap();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let stream = Builder::new()
            .read(b"*2\r\n$4\r\nEC")
            .read(b"HO\r\n$5\r\nhel")
            .read(b"lo\r\n")
            .write(b"$5\r\nhello\r\n")
            .build();
        let (handler, _) = create_handler(stream);

        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_commands_reply_in_order() {
        let stream = Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*2\r\n$3\r\nGET\r\n$1\r\nx\r\n")
            .write(b"+OK\r\n$1\r\nv\r\n$-1\r\n")
            .build();
        let (handler, stats) = create_handler(stream);

        handler.run().await.unwrap();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection_open() {
        let stream = Builder::new()
            .read(b"*1\r\n$3\r\nFOO\r\n")
            .write(b"-ERR unknown command 'FOO'\r\n")
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();
        let (handler, _) = create_handler(stream);

        handler.run().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_header_closes_connection() {
        let stream = Builder::new()
            .read(b"*x\r\n")
            .write(b"-ERR Protocol error: invalid array header: \"x\"\r\n")
            .build();
        let (handler, stats) = create_handler(stream);

        let result = handler.run().await;

        assert!(matches!(
            result,
            Err(ConnectionError::Decode(DecodeError::InvalidArrayHeader(_)))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_zero_length_array_is_rejected() {
        let stream = Builder::new()
            .read(b"*0\r\n")
            .write(b"-ERR Protocol error: empty command array\r\n")
            .build();
        let (handler, stats) = create_handler(stream);

        let result = handler.run().await;

        assert!(matches!(
            result,
            Err(ConnectionError::Decode(DecodeError::EmptyArray))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_an_error() {
        let (mut client, server) = tokio::io::duplex(1024);
        client.write_all(b"*2\r\n$3\r\nGET\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let (handler, stats) = create_handler(server);
        let result = handler.run().await;

        assert!(matches!(
            result,
            Err(ConnectionError::Decode(DecodeError::UnexpectedEof))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(
            reply,
            b"-ERR Protocol error: unexpected end of stream inside a frame\r\n"
        );
    }

    #[tokio::test]
    async fn test_commands_before_bad_frame_are_answered() {
        let stream = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .write(b"-ERR Protocol error: invalid array header: \"$4\"\r\n")
            .build();
        let (handler, stats) = create_handler(stream);

        assert!(handler.run().await.is_err());
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_buffer_limit() {
        let stats = Arc::new(ConnectionStats::new());
        let commands = CommandHandler::new(Arc::new(Store::new()));
        let stream = Builder::new()
            .read(b"*1\r\n$100\r\n0123456789")
            .write(b"-ERR Protocol error: buffer size limit exceeded\r\n")
            .build();
        let handler = ConnectionHandler::new(stream, test_addr(), commands, stats, 8);

        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::BufferFull)));
    }

    #[tokio::test]
    async fn test_ping_pong_over_tcp() {
        let (addr, _, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

        assert_eq!(read_exactly(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_set_get_over_tcp() {
        let (addr, storage, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 5).await, b"+OK\r\n");

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut client, 10).await, b"$4\r\nAriz\r\n");

        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn test_store_is_shared_between_connections() {
        let (addr, _, _) = create_test_server().await;

        let mut writer = TcpStream::connect(addr).await.unwrap();
        let mut reader = TcpStream::connect(addr).await.unwrap();

        writer
            .write_all(&RespValue::command(&["SET", "shared", "yes"]).serialize())
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut writer, 5).await, b"+OK\r\n");

        reader
            .write_all(&RespValue::command(&["GET", "shared"]).serialize())
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut reader, 9).await, b"$3\r\nyes\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Send a command; the reply proves the connection was accepted
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let _ = read_exactly(&mut client, 7).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        // Close connection
        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
