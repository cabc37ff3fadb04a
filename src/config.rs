// MIT License - Copyright (c) 2026 Peter Wright

use std::time::Duration;

use crate::packet::ChecksumMode;

/// Where the panel lives: an IP232 bridge or a local serial port.
///
/// The serial link is always 9600 baud 8-N-1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Serial { path: String },
}

/// What happens when the outbound command queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the oldest queued command to make room.
    #[default]
    DropOldest,
    /// Reject the new command with `NessError::QueueFull`.
    Reject,
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Panel endpoint.
    pub endpoint: Endpoint,
    /// Cadence of the periodic status refresh (default: 60 s).
    pub update_interval: Duration,
    /// Work around panels (< v5.8) that report an empty arming snapshot
    /// while armed: only system status events may demote a known arming
    /// state, and the first zone change on a connection while arming is
    /// still unknown triggers a full status probe.
    pub infer_arming_state: bool,
    /// Strict: packets with bad checksums never reach the state model.
    /// Lenient: they do, with an error marker delivered alongside.
    pub validate_checksums: ChecksumMode,
    /// Timeout for one connection attempt (default: 10 s).
    pub connect_timeout: Duration,
    /// How long the reader waits without receiving anything before the
    /// connection is considered stale. Defaults to `update_interval` plus
    /// 30 seconds.
    pub keepalive_timeout: Option<Duration>,
    /// Base delay for reconnection backoff (default: 1 s).
    pub backoff_base: Duration,
    /// Ceiling for reconnection backoff (default: 60 s).
    pub backoff_cap: Duration,
    /// Bound on the outbound command queue; `None` means unbounded.
    pub command_queue_capacity: Option<usize>,
    /// Applied when the bounded queue is full.
    pub overflow_policy: OverflowPolicy,
    /// How long `close()` waits for queued commands to drain (default: 2 s).
    pub shutdown_timeout: Duration,
    /// Per-subscription event buffer capacity (default: 256).
    pub event_buffer: usize,
    /// Whether a zone's first transition out of `Unknown` notifies
    /// zone-change observers (default: true).
    pub notify_first_zone_change: bool,
}

impl ClientConfig {
    /// Start building a configuration for a panel behind an IP232 bridge.
    pub fn tcp(host: impl Into<String>, port: u16) -> ClientConfigBuilder {
        ClientConfigBuilder::new(Endpoint::Tcp {
            host: host.into(),
            port,
        })
    }

    /// Start building a configuration for a directly attached serial port.
    pub fn serial(path: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(Endpoint::Serial { path: path.into() })
    }

    /// The effective stale-connection window.
    pub fn effective_keepalive_timeout(&self) -> Duration {
        self.keepalive_timeout
            .unwrap_or(self.update_interval + Duration::from_secs(30))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    fn new(endpoint: Endpoint) -> Self {
        Self {
            config: ClientConfig {
                endpoint,
                update_interval: Duration::from_secs(60),
                infer_arming_state: false,
                validate_checksums: ChecksumMode::Strict,
                connect_timeout: Duration::from_secs(10),
                keepalive_timeout: None,
                backoff_base: Duration::from_secs(1),
                backoff_cap: Duration::from_secs(60),
                command_queue_capacity: None,
                overflow_policy: OverflowPolicy::DropOldest,
                shutdown_timeout: Duration::from_secs(2),
                event_buffer: 256,
                notify_first_zone_change: true,
            },
        }
    }

    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.update_interval = interval;
        self
    }

    pub fn infer_arming_state(mut self, infer: bool) -> Self {
        self.config.infer_arming_state = infer;
        self
    }

    pub fn validate_checksums(mut self, mode: ChecksumMode) -> Self {
        self.config.validate_checksums = mode;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.config.keepalive_timeout = Some(timeout);
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.config.backoff_cap = cap;
        self
    }

    pub fn command_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.command_queue_capacity = Some(capacity);
        self
    }

    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow_policy = policy;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    pub fn notify_first_zone_change(mut self, notify: bool) -> Self {
        self.config.notify_first_zone_change = notify;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
