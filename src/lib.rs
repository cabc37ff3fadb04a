// MIT License - Copyright (c) 2026 Peter Wright

//! # ness-client
//!
//! Asynchronous client for the Ness D8x/D16x/D32x family of alarm panels,
//! which speak a line-oriented ASCII protocol over a serial port (9600
//! 8-N-1) or an IP232 TCP bridge.
//!
//! The crate decodes the panel's wire packets into typed events, folds
//! them into an authoritative zone/arming state model, and manages the
//! connection: periodic status probes, reconnection with backoff, and
//! cancellation-safe shutdown. No external dependencies beyond tokio,
//! thiserror, tracing, bitflags and the serial/chrono support crates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ness_client::{ArmingState, Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::tcp("192.168.1.20", 2401)
//!         .infer_arming_state(true)
//!         .build();
//!     let client = Client::new(config);
//!     client.connect().await?;
//!
//!     let mut states = client.state_changes();
//!     tokio::spawn(async move {
//!         while let Some(change) = states.next().await {
//!             println!("arming: {change:?}");
//!         }
//!     });
//!
//!     client.arm_away(Some("1234"))?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod packet;
pub mod protocol;
pub mod subscription;
pub mod transport;

// Re-exports for convenience
pub use alarm::{Alarm, AlarmChange, ArmingMode, ArmingState, PanelInfo, ZoneState};
pub use client::Client;
pub use config::{ClientConfig, ClientConfigBuilder, Endpoint, OverflowPolicy};
pub use error::{NessError, PacketError, Result};
pub use event::{
    AreaTag, Event, EventKind, EventSource, PanelModel, PanelVersion, StatusPayload, StatusUpdate,
    SystemStatusEvent, UserInterfaceRequest,
};
pub use packet::{ChecksumMode, CommandType, Packet};
pub use protocol::Command;
pub use subscription::{ClientEvent, Disposer, StateChange, StreamItem, Subscription, ZoneChange};
pub use transport::{Connection, SerialConnection, TcpConnection};
