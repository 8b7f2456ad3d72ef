//! Per-room guess countdown for Marquee.
//!
//! A [`RoundTimer`] holds at most one deadline. Arming replaces whatever
//! was pending, disarming forgets it. Nothing is spawned: the owner polls
//! [`RoundTimer::expired`] inside its own event loop, so an expiry is just
//! another event for the room and can never race a guess.
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* join, select, guess... */ }
//!         expiry = timer.expired() => {
//!             // apply the idle penalty, then re-arm
//!             timer.arm();
//!         }
//!     }
//! }
//! ```
//!
//! While disarmed, `expired()` pends forever and `select!` simply keeps
//! serving the other branches.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Information about a deadline that just passed, returned by
/// [`RoundTimer::expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerExpiry {
    /// How many times this timer has fired in total (starts at 1).
    pub expiration: u64,
    /// How far past the deadline the owner got around to noticing.
    /// Non-zero when the room's event loop was busy.
    pub late_by: Duration,
}

/// Single-shot, re-armable countdown.
///
/// One per room. The countdown only ever runs while a round is active.
#[derive(Debug)]
pub struct RoundTimer {
    duration: Duration,
    deadline: Option<Instant>,
    expirations: u64,
}

impl RoundTimer {
    /// Creates a disarmed timer that counts down `duration` once armed.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            deadline: None,
            expirations: 0,
        }
    }

    /// Starts the countdown from now, replacing any pending deadline.
    pub fn arm(&mut self) {
        let replaced = self.deadline.is_some();
        self.deadline = Some(Instant::now() + self.duration);
        trace!(
            secs = self.duration.as_secs_f64(),
            replaced,
            "round timer armed"
        );
    }

    /// Cancels the pending deadline, if any.
    ///
    /// Returns `true` if a deadline was actually pending.
    pub fn disarm(&mut self) -> bool {
        let was_armed = self.deadline.take().is_some();
        if was_armed {
            trace!("round timer disarmed");
        }
        was_armed
    }

    /// Whether a deadline is currently pending.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the pending deadline, or `None` when disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// The configured countdown length.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Total number of times the timer has fired.
    pub fn expirations(&self) -> u64 {
        self.expirations
    }

    /// Waits until the pending deadline passes.
    ///
    /// The timer is disarmed when this returns; the caller decides
    /// whether to [`arm`](Self::arm) again. When nothing is pending this
    /// future never resolves.
    ///
    /// Cancel-safe: dropping the future (e.g. because another
    /// `select!` branch won) leaves the deadline untouched.
    pub async fn expired(&mut self) -> TimerExpiry {
        let Some(deadline) = self.deadline else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(deadline).await;

        let late_by = Instant::now().saturating_duration_since(deadline);
        self.deadline = None;
        self.expirations += 1;

        if late_by > self.duration / 10 {
            warn!(
                expiration = self.expirations,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "round timer fired late"
            );
        } else {
            debug!(expiration = self.expirations, "round timer expired");
        }

        TimerExpiry {
            expiration: self.expirations,
            late_by,
        }
    }
}
