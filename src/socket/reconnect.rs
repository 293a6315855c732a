//! Fixed-delay reconnection state machine for the push channel.
//!
//! `Disconnected → Connecting → Connected`, back to `Disconnected` on close.
//! The machine only decides *when* to connect; the run loop in
//! [`super::client`] owns the timers and the socket.

use std::time::Duration;

use crate::config::DashboardConfig;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Reconnect timing.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first attempt after startup.
    pub initial_delay: Duration,
    /// Delay before every attempt after a close.
    pub reconnect_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(15),
        }
    }
}

impl From<&DashboardConfig> for ReconnectConfig {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            initial_delay: config.initial_connect_delay,
            reconnect_delay: config.reconnect_delay,
        }
    }
}

/// Tracks connection state and guarantees at most one pending timer.
#[derive(Debug)]
pub struct Reconnector {
    config: ReconnectConfig,
    state: ConnectionState,
    timer_pending: bool,
    reconnects_scheduled: u32,
}

impl Reconnector {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            state: ConnectionState::Disconnected,
            timer_pending: false,
            reconnects_scheduled: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn timer_pending(&self) -> bool {
        self.timer_pending
    }

    /// Reconnects scheduled by [`on_close`](Self::on_close) so far.
    pub fn reconnects_scheduled(&self) -> u32 {
        self.reconnects_scheduled
    }

    /// Service init. Returns the delay before the first attempt, or `None`
    /// if a timer is already pending or a connection is underway.
    pub fn start(&mut self) -> Option<Duration> {
        if self.timer_pending || self.state != ConnectionState::Disconnected {
            return None;
        }
        self.timer_pending = true;
        Some(self.config.initial_delay)
    }

    /// The pending timer elapsed; an attempt begins.
    pub fn on_timer_fired(&mut self) {
        if !self.timer_pending {
            return;
        }
        self.timer_pending = false;
        self.state = ConnectionState::Connecting;
    }

    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// The socket closed (or the attempt failed). Returns the delay before
    /// the next attempt, or `None` if one is already scheduled.
    pub fn on_close(&mut self) -> Option<Duration> {
        self.state = ConnectionState::Disconnected;
        if self.timer_pending {
            return None;
        }
        self.timer_pending = true;
        self.reconnects_scheduled += 1;
        Some(self.config.reconnect_delay)
    }
}
