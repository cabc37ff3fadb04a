// MIT License - Copyright (c) 2026 Peter Wright

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;

use crate::error::{NessError, Result};
use crate::transport::{Connection, LineFramer};

/// Direct serial transport. The panel's port is fixed at 9600 baud 8-N-1.
pub struct SerialConnection {
    path: String,
    io: Option<Io>,
}

struct Io {
    reader: LineFramer<ReadHalf<SerialStream>>,
    writer: WriteHalf<SerialStream>,
}

impl SerialConnection {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            io: None,
        }
    }
}

#[async_trait]
impl Connection for SerialConnection {
    async fn connect(&mut self) -> Result<()> {
        let stream = tokio_serial::new(self.path.as_str(), 9600)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .open_native_async()?;
        debug!("Serial port {} opened", self.path);
        let (reader, writer) = tokio::io::split(stream);
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
        self.io = None;
        Ok(())
    }
}
