use std::time::Duration;

use crate::config::ReconnectSettings;

/// Bounded exponential backoff for reconnection.
///
/// Attempt `n` (1-based) waits `min(initial * multiplier^(n-1), max)`.
/// `next_delay` returns `None` once `max_attempts` delays have been handed out.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: if multiplier.is_finite() && multiplier >= 1.0 {
                multiplier
            } else {
                1.0
            },
            max_attempts,
            attempt: 0,
        }
    }

    pub fn from_settings(settings: &ReconnectSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.initial_backoff_ms),
            Duration::from_millis(settings.max_backoff_ms),
            settings.multiplier,
            settings.max_attempts,
        )
    }

    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let exponent = i32::try_from(self.attempt).unwrap_or(i32::MAX);
        self.attempt += 1;

        let factor = self.multiplier.powi(exponent);
        let millis = self.initial.as_millis() as f64 * factor;
        let delay = if millis.is_finite() && millis < self.max.as_millis() as f64 {
            Duration::from_millis(millis as u64)
        } else {
            self.max
        };
        Some(delay)
    }

    /// Number of delays handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
