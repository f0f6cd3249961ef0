//! Time Window
//!
//! Buffers signals from the first arrival until `duration` has elapsed.
//! Closure is evaluated when a signal arrives; the arriving signal belongs to
//! the window it closes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::signal::NormalizedSignal;

/// Default window length
pub const DEFAULT_WINDOW_SECS: u64 = 30;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Open window state. `opened_at` is unset while the buffer is empty.
#[derive(Debug)]
pub struct Window {
    duration: Duration,
    opened_at: Option<Instant>,
    buffer: Vec<NormalizedSignal>,
}

/// A window that has been swapped out for processing
#[derive(Debug, Clone)]
pub struct ClosedWindow {
    /// Idempotency key for the decision produced from this window
    pub window_id: String,
    pub signals: Vec<NormalizedSignal>,
    /// How long the window was open when it closed
    pub elapsed: Duration,
}

impl ClosedWindow {
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}

impl Window {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            opened_at: None,
            buffer: Vec::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.opened_at.is_some()
    }

    /// Signals buffered so far, in arrival order
    pub fn signals(&self) -> &[NormalizedSignal] {
        &self.buffer
    }

    /// Instant at which an open window becomes due
    pub fn deadline(&self) -> Option<Instant> {
        self.opened_at.map(|start| start + self.duration)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        match self.opened_at {
            Some(start) => now.saturating_duration_since(start) >= self.duration,
            None => false,
        }
    }

    /// Accept a signal arriving at `now`.
    ///
    /// Returns the closed window when this arrival pushes the window past its
    /// duration; the buffer is then empty and the window idle again.
    pub fn push(&mut self, signal: NormalizedSignal, now: Instant) -> Option<ClosedWindow> {
        if self.opened_at.is_none() {
            self.opened_at = Some(now);
        }
        self.buffer.push(signal);

        if self.is_expired(now) {
            self.close(now)
        } else {
            None
        }
    }

    /// Close the window if it is due. Used by the idle flush timer.
    pub fn flush_expired(&mut self, now: Instant) -> Option<ClosedWindow> {
        if self.is_expired(now) {
            self.close(now)
        } else {
            None
        }
    }

    /// Drop the buffer without closing. Returns how many signals were dropped.
    pub fn discard(&mut self) -> usize {
        self.opened_at = None;
        std::mem::take(&mut self.buffer).len()
    }

    fn close(&mut self, now: Instant) -> Option<ClosedWindow> {
        let start = self.opened_at.take()?;
        let signals = std::mem::take(&mut self.buffer);
        let window_id = window_id(&signals)?;

        Some(ClosedWindow {
            window_id,
            signals,
            elapsed: now.saturating_duration_since(start),
        })
    }
}

/// Deterministic key for a batch of signals.
///
/// Built from the first and last ingestion timestamps plus the count, so a
/// redelivered batch with the same boundaries maps to the same key.
pub fn window_id(signals: &[NormalizedSignal]) -> Option<String> {
    let first = signals.first()?;
    let last = signals.last()?;

    let mut hash = FNV_OFFSET;
    for part in [
        nanos(&first.received_at),
        nanos(&last.received_at),
        signals.len() as i64,
    ] {
        for byte in part.to_le_bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }

    Some(format!("{:016x}", hash))
}

fn nanos(ts: &DateTime<Utc>) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or_else(|| ts.timestamp_micros())
}
