use serde::{Deserialize, Serialize};

/// Granularity of the elapsed-time counters.
pub const ELAPSED_QUANTUM_MS: u64 = 100;

/// Tick-driven approximations of time spent memorizing and guessing.
///
/// Counters only grow when the host delivers ticks, so they drift if the host is
/// suspended. That is acceptable for analytics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedTracker {
    pub memorize_ms: u64,
    pub guess_ms: u64,
}

impl ElapsedTracker {
    pub fn tick_memorize(&mut self) {
        self.memorize_ms += ELAPSED_QUANTUM_MS;
    }

    pub fn tick_guess(&mut self) {
        self.guess_ms += ELAPSED_QUANTUM_MS;
    }

    pub fn reset_guess(&mut self) {
        self.guess_ms = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
