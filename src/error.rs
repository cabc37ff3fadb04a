// MIT License - Copyright (c) 2026 Peter Wright

/// Errors produced while decoding a single line off the wire.
///
/// These are recoverable: the reader logs them, surfaces them on the raw
/// event stream, and keeps reading. Each variant carries the offending text
/// so diagnostics can show exactly what the panel sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("truncated packet: {line:?}")]
    TruncatedPacket { line: String },

    #[error("malformed field {span:?} in {line:?}")]
    MalformedHeader { line: String, span: String },

    #[error("bad start byte {start:#04x} in {line:?}")]
    BadStartByte { line: String, start: u8 },

    #[error("checksum mismatch in {line:?}: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumError {
        line: String,
        expected: u8,
        actual: u8,
    },

    #[error("unknown command {command:#04x} in {line:?}")]
    UnknownCommand { line: String, command: u8 },

    #[error("unknown status request id {id} in {line:?}")]
    UnknownStatusId { line: String, id: u8 },
}

/// All errors that can occur in the ness-client library.
#[derive(Debug, thiserror::Error)]
pub enum NessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("connection reset by panel")]
    ConnectionReset,

    #[error("write failed: {0}")]
    WriteFailed(std::io::Error),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("keystring contains characters outside the keypad set: {keys:?}")]
    InvalidKeys { keys: String },

    #[error("status request id out of range: {id} (max 33)")]
    InvalidStatusId { id: u8 },

    #[error("auxiliary output out of range: {output} (must be 1-8)")]
    InvalidAuxOutput { output: u8 },

    #[error("command queue full")]
    QueueFull,

    #[error("client is closed")]
    Closed,
}

impl NessError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NessError::Io(_)
                | NessError::ConnectTimeout
                | NessError::ConnectionReset
                | NessError::WriteFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, NessError>;
