//! Async Client
//!
//! A small client for the compressed text protocol, used by the load
//! generator and the end-to-end tests.
//!
//! Requests are sent as one zlib stream per write. Replies are read until
//! they form a complete stream, so a reply split across TCP segments is
//! still decoded correctly.
//!
//! ```ignore
//! use zkv::client::Client;
//!
//! let mut client = Client::connect("127.0.0.1:8888").await?;
//! let reply = client.set("color", "blue").await?;
//! assert_eq!(reply, "Set color=blue\nreads=0\nwrites=1\n");
//! ```

use crate::protocol::{codec, CodecError, COMPRESSION_FAILED};
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

/// Largest reply the client will buffer before giving up (1 MB)
const MAX_REPLY_SIZE: usize = 1024 * 1024;

/// Errors returned by [`Client`].
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("server closed the connection")]
    Closed,

    #[error("reply exceeds the 1 MB limit")]
    ReplyTooLarge,
}

/// A connection to a zkv server.
#[derive(Debug)]
pub struct Client {
    stream: TcpStream,
    buffer: BytesMut,
}

impl Client {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(4096),
        })
    }

    /// Sends `$get <key>` and returns the reply text.
    pub async fn get(&mut self, key: &str) -> Result<String, ClientError> {
        self.request(&format!("$get {}", key)).await
    }

    /// Sends `$set <key>=<value>` and returns the reply text.
    pub async fn set(&mut self, key: &str, value: &str) -> Result<String, ClientError> {
        self.request(&format!("$set {}={}", key, value)).await
    }

    /// Sends a raw request line and returns the reply text.
    pub async fn request(&mut self, line: &str) -> Result<String, ClientError> {
        let compressed = codec::compress(line.as_bytes())?;
        self.stream.write_all(&compressed).await?;
        self.read_reply().await
    }

    /// Reads until the buffered bytes form a complete reply.
    async fn read_reply(&mut self) -> Result<String, ClientError> {
        self.buffer.clear();

        loop {
            if self.stream.read_buf(&mut self.buffer).await? == 0 {
                return Err(ClientError::Closed);
            }

            // The server sends this one uncompressed
            if &self.buffer[..] == COMPRESSION_FAILED.as_bytes() {
                return Ok(COMPRESSION_FAILED.to_string());
            }

            match codec::decompress(&self.buffer) {
                Ok(text) => return Ok(String::from_utf8_lossy(&text).into_owned()),
                Err(_) if self.buffer.len() < MAX_REPLY_SIZE => continue,
                Err(_) => return Err(ClientError::ReplyTooLarge),
            }
        }
    }
}
