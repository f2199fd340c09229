//! [`ConnectionMachine`] – connection state and bounded reconnect policy.
//!
//! # State machine
//!
//! ```text
//!            begin_connect           on_open
//!  Closed ─────────────▶ Connecting ─────────▶ Open
//!    ▲                     │   ▲                 │
//!    │ give up             │   │ on_retry_due    │ on_failure
//!    │                     ▼   │                 ▼
//!    └────────────────── Reconnecting ◀──────────┘
//! ```
//!
//! Every failure, whether the connection could not be established or died
//! mid-stream, goes through [`ConnectionMachine::on_failure`]. A successful
//! open resets the attempt counter. Once `max_attempts` retries have been
//! spent, the next failure moves the machine to a terminal `Closed` and no
//! further retry is ever scheduled. At most one retry is pending at a time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection state, owned solely by the transport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

/// Outcome of reporting a failure to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then call [`ConnectionMachine::on_retry_due`] and connect.
    Retry { attempt: u32, delay: Duration },
    /// A retry is already scheduled; nothing new was scheduled.
    AlreadyPending,
    /// Retries are exhausted or the client was disconnected.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    max_attempts: u32,
    delay: Duration,
    attempts: u32,
    retry_pending: bool,
    terminal: bool,
}

impl ConnectionMachine {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            state: ConnectionState::Closed,
            max_attempts,
            delay,
            attempts: 0,
            retry_pending: false,
            terminal: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries spent since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// `true` once the machine has given up or been disconnected.
    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Enter `Connecting`. Returns `false` (and stays put) when terminal or
    /// while a retry timer is still outstanding.
    pub fn begin_connect(&mut self) -> bool {
        if self.terminal || self.retry_pending {
            return false;
        }
        self.state = ConnectionState::Connecting;
        true
    }

    pub fn on_open(&mut self) {
        if self.terminal {
            return;
        }
        self.attempts = 0;
        self.retry_pending = false;
        self.state = ConnectionState::Open;
    }

    /// Report a connection failure or loss.
    pub fn on_failure(&mut self) -> RetryDecision {
        if self.terminal {
            return RetryDecision::GiveUp;
        }
        if self.retry_pending {
            return RetryDecision::AlreadyPending;
        }
        if self.attempts >= self.max_attempts {
            self.terminal = true;
            self.state = ConnectionState::Closed;
            return RetryDecision::GiveUp;
        }
        self.attempts += 1;
        self.retry_pending = true;
        self.state = ConnectionState::Reconnecting;
        RetryDecision::Retry {
            attempt: self.attempts,
            delay: self.delay,
        }
    }

    /// The pending retry timer fired; the caller may now connect again.
    pub fn on_retry_due(&mut self) {
        self.retry_pending = false;
    }

    /// Cancel any pending retry and close for good.
    pub fn disconnect(&mut self) {
        self.retry_pending = false;
        self.terminal = true;
        self.state = ConnectionState::Closed;
    }
}
