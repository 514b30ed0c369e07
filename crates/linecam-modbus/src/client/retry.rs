// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Retry policy and warning throttle for device operations.
//!
//! The policy is deliberately tiny. A transport fault closes the link and,
//! for operations that are safe to repeat, the serializer reconnects and
//! runs the operation exactly once more. Pulse-type operations use
//! [`RetryPolicy::NoRetry`] because repeating them could fire a physical
//! actuator twice.

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

// =============================================================================
// RetryPolicy
// =============================================================================

/// What to do after a transport fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetryPolicy {
    /// Reconnect and run the operation one more time.
    #[default]
    RetryOnce,
    /// Propagate the fault. Required for pulses and other non-idempotent
    /// sequences.
    NoRetry,
}

impl RetryPolicy {
    /// Number of extra attempts after the first one.
    pub fn max_retries(&self) -> u32 {
        match self {
            Self::RetryOnce => 1,
            Self::NoRetry => 0,
        }
    }

    /// Returns `true` if a retry is permitted after `attempt` failed attempts.
    #[inline]
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries()
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RetryOnce => write!(f, "retry-once"),
            Self::NoRetry => write!(f, "no-retry"),
        }
    }
}

// =============================================================================
// WarnThrottle
// =============================================================================

/// Rate limiter for repeated warnings.
#[derive(Debug)]
pub struct WarnThrottle {
    state: Mutex<ThrottleState>,
}

#[derive(Debug)]
struct ThrottleState {
    interval: Duration,
    next: Option<Instant>,
}

impl WarnThrottle {
    /// Creates a throttle that admits one warning per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(ThrottleState { interval, next: None }),
        }
    }

    /// Returns the current window.
    pub fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    /// Replaces the window. An armed deadline is pulled in if the new window
    /// is shorter.
    pub fn set_interval(&self, interval: Duration) {
        let mut state = self.state.lock();
        if let Some(armed_at) = state.next.and_then(|next| next.checked_sub(state.interval)) {
            state.next = Some(armed_at + interval.min(state.interval));
        }
        state.interval = interval;
    }

    /// Returns `true` if a warning may be emitted now, and arms the throttle.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        match state.next {
            Some(deadline) if now < deadline => false,
            _ => {
                state.next = Some(now + state.interval);
                true
            }
        }
    }
}
