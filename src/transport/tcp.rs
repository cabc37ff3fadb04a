// MIT License - Copyright (c) 2026 Peter Wright

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{NessError, Result};
use crate::transport::{Connection, LineFramer};

/// TCP transport, typically to an IP232 serial bridge in front of the
/// panel.
pub struct TcpConnection {
    host: String,
    port: u16,
    io: Option<Io>,
}

struct Io {
    reader: LineFramer<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            io: None,
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        debug!("TCP socket connected to {}:{}", self.host, self.port);
        let (reader, writer) = stream.into_split();
        self.io = Some(Io {
            reader: LineFramer::new(reader),
            writer,
        });
        Ok(())
    }

    fn connected(&self) -> bool {
        self.io.is_some()
    }

    async fn readline(&mut self) -> Result<Option<String>> {
        let io = self.io.as_mut().ok_or(NessError::ConnectionReset)?;
        match io.reader.next_line().await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.io = None;
                Ok(None)
            }
            Err(err) => {
                self.io = None;
                Err(err.into())
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let io = self.io.as_mut().ok_or(NessError::ConnectionReset)?;
        io.writer
            .write_all(data)
            .await
            .map_err(NessError::WriteFailed)?;
        io.writer.flush().await.map_err(NessError::WriteFailed)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut io) = self.io.take() {
            let _ = io.writer.shutdown().await;
        }
        Ok(())
    }
}
