// MIT License - Copyright (c) 2026 Peter Wright

//! Byte-stream transports for reaching a panel.
//!
//! [`Connection`] abstracts over TCP (an IP232 bridge), a local serial
//! port, and injected test transports. A connection object is reusable:
//! `connect` may be called again after the link drops, so the client can
//! hold one connection for its whole life and reconnect through it.

pub mod serial;
pub mod tcp;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::error::Result;

pub use serial::SerialConnection;
pub use tcp::TcpConnection;

/// A full-duplex line-oriented link to a panel.
#[async_trait]
pub trait Connection: Send {
    /// Establish (or re-establish) the link.
    async fn connect(&mut self) -> Result<()>;

    /// Whether the link is currently established.
    fn connected(&self) -> bool;

    /// Read the next line, stripped of its terminator. `None` means the
    /// peer closed the connection.
    async fn readline(&mut self) -> Result<Option<String>>;

    /// Write raw bytes to the link.
    async fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Tear the link down. Safe to call when already closed.
    async fn close(&mut self) -> Result<()>;
}

/// Accumulates bytes from a reader and yields lines split on `\n`,
/// tolerating both `\r\n` and bare `\n` terminators.
///
/// The partial-line buffer lives in the framer rather than on the stack of
/// `next_line`, so a cancelled read never loses bytes: the next call picks
/// up exactly where the cancelled one stopped.
pub(crate) struct LineFramer<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin + Send> LineFramer<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// The next line, or `None` on a clean EOF.
    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.buf).await?;
        if n == 0 && self.buf.is_empty() {
            return Ok(None);
        }
        let mut line = std::mem::take(&mut self.buf);
        while line.last().is_some_and(|b| matches!(b, b'\r' | b'\n')) {
            line.pop();
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }
}
