use crate::planner::BatchSizeFraction;
use std::time::Duration;

/// Tuning for a disbursement run
#[derive(Debug, Clone)]
pub struct DisbursementConfig {
    /// Starting batch-size fraction; 1.0 puts every unpaid record in one batch
    pub initial_fraction: f64,
    /// Smallest native-currency amount a single output may carry
    pub native_floor: u64,
    /// Decimal places of the native currency, for human-readable amounts
    pub native_decimals: u32,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Ceiling for the doubling poll backoff
    pub max_poll_interval: Duration,
    /// Bound on batch-size corrections within one run
    pub max_corrections: usize,
}

impl Default for DisbursementConfig {
    fn default() -> Self {
        Self {
            initial_fraction: BatchSizeFraction::WHOLE.value(),
            native_floor: 1_000_000,
            native_decimals: 6,
            confirmation_timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(5),
            max_poll_interval: Duration::from_secs(60),
            max_corrections: 32,
        }
    }
}

impl DisbursementConfig {
    pub fn with_initial_fraction(mut self, fraction: f64) -> Self {
        self.initial_fraction = fraction;
        self
    }

    pub fn with_native_floor(mut self, floor: u64, decimals: u32) -> Self {
        self.native_floor = floor;
        self.native_decimals = decimals;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_interval: Duration) -> Self {
        self.poll_interval = interval;
        self.max_poll_interval = max_interval.max(interval);
        self
    }

    pub fn with_max_corrections(mut self, max_corrections: usize) -> Self {
        self.max_corrections = max_corrections;
        self
    }
}
