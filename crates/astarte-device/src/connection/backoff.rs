// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reconnection backoff bookkeeping.
//!
//! Jittered exponential backoff: the delay window doubles on every
//! consecutive failure up to a cap, and each drawn delay is uniform over
//! `[0, window]` (full jitter). A successful connection resets the window
//! to the initial value.
//!
//! The jitter source is a small xorshift generator seeded once from the
//! system randomness source; reconnect pacing needs decorrelation, not
//! cryptographic quality.

use std::time::Duration;

use ring::rand::{SecureRandom, SystemRandom};

/// Seed fallback when the system randomness source fails at init.
const FALLBACK_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// Exponential backoff state for one reconnection loop.
#[derive(Debug)]
pub struct BackoffContext {
    initial_ms: u64,
    max_ms: u64,
    window_ms: u64,
    jitter: bool,
    rng_state: u64,
}

impl BackoffContext {
    /// Backoff between `initial` and `max`, with or without jitter.
    pub fn new(initial: Duration, max: Duration, jitter: bool) -> Self {
        let initial_ms = (initial.as_millis() as u64).max(1);
        let max_ms = (max.as_millis() as u64).max(initial_ms);

        let mut seed = [0u8; 8];
        let rng_state = match SystemRandom::new().fill(&mut seed) {
            Ok(()) => u64::from_le_bytes(seed) | 1,
            Err(_) => FALLBACK_SEED,
        };

        Self {
            initial_ms,
            max_ms,
            window_ms: initial_ms,
            jitter,
            rng_state,
        }
    }

    /// Draw the delay for the next attempt and widen the window.
    pub fn next_delay(&mut self) -> Duration {
        let delay_ms = if self.jitter {
            self.next_u64() % (self.window_ms + 1)
        } else {
            self.window_ms
        };
        self.window_ms = self.window_ms.saturating_mul(2).min(self.max_ms);
        Duration::from_millis(delay_ms)
    }

    /// Reset to the initial window after a successful connection.
    pub fn reset(&mut self) {
        self.window_ms = self.initial_ms;
    }

    /// The current (un-jittered) delay window.
    pub fn current_window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// xorshift64* step.
    fn next_u64(&mut self) -> u64 {
        let mut x = self.rng_state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.rng_state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}
