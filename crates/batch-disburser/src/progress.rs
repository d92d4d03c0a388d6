use std::fmt;

/// States a batch moves through, plus the outer retry state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Building,
    AwaitingSignature,
    Submitting,
    AwaitingConfirmation,
    Advancing,
    Retrying,
}

impl Phase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Planning => "Planning",
            Self::Building => "Building TX",
            Self::AwaitingSignature => "Awaiting Signature",
            Self::Submitting => "Submitting TX",
            Self::AwaitingConfirmation => "Awaiting Network Confirmation",
            Self::Advancing => "Confirmed",
            Self::Retrying => "Retrying",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives `(message, batch, total)` updates during a run.
///
/// `batch` is 1-based. A batch-size correction is reported as `(message, 0, 0)`.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, message: &str, batch: usize, total: usize);
}

impl<F> ProgressReporter for F
where
    F: Fn(&str, usize, usize) + Send + Sync,
{
    fn report(&self, message: &str, batch: usize, total: usize) {
        self(message, batch, total)
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl ProgressReporter for Silent {
    fn report(&self, _message: &str, _batch: usize, _total: usize) {}
}
