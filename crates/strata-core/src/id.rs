//! Time-ordered identifier generation.
//!
//! Identifiers are 64-bit values composed of a millisecond offset from a
//! configured epoch (high bits), a random 12-bit sequence, and a 10-bit low
//! field derived from a caller-supplied seed or a random fallback. They sort
//! by creation time to the millisecond; uniqueness within a millisecond
//! rests on the 22 bits of entropy and collisions are tolerated as rare.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates time-ordered 64-bit identifiers from a configured epoch.
///
/// An epoch of zero means generation is disabled: [`generate`](Self::generate)
/// returns 0 and callers must supply their own identifier or reject the write.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    epoch_ms: u64,
}

impl IdGenerator {
    /// Creates a generator over the given epoch (milliseconds since Unix epoch).
    #[must_use]
    pub const fn new(epoch_ms: u64) -> Self {
        Self { epoch_ms }
    }

    /// Creates a disabled generator.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { epoch_ms: 0 }
    }

    /// True when an epoch is configured and identifiers can be generated.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.epoch_ms != 0
    }

    /// Generates an identifier, mixing in `seed` for the low 10 bits when given.
    ///
    /// Returns 0 when no epoch is configured.
    #[must_use]
    pub fn generate(&self, seed: Option<u64>) -> u64 {
        if !self.is_enabled() {
            return 0;
        }

        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let mut rng = rand::thread_rng();
        let sequence: u64 = rng.gen_range(0..4096);
        let low = seed.unwrap_or_else(|| rng.gen::<u64>()) % 1024;

        (now_ms.saturating_sub(self.epoch_ms) << 23) | (sequence << 13) | low
    }
}

/// Joins identifiers into a comma-separated string.
#[must_use]
pub fn pack_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a comma-separated string back into identifiers.
///
/// Unparseable segments are dropped.
#[must_use]
pub fn unpack_ids(packed: &str) -> Vec<u64> {
    packed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
