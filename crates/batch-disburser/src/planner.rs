use crate::error::DisbursementError;
use std::fmt;

/// Multiplier applied to the unpaid count to size each batch
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct BatchSizeFraction(f64);

impl BatchSizeFraction {
    /// Whole unpaid set in a single batch
    pub const WHOLE: Self = Self(1.0);

    pub fn new(value: f64) -> Result<Self, DisbursementError> {
        if value.is_finite() && value > 0.0 {
            return Ok(Self(value));
        }

        Err(DisbursementError::InvalidFraction(value))
    }

    pub const fn value(self) -> f64 {
        self.0
    }

    /// `floor(f × unpaid)`, clamped to `1..=unpaid`. Zero only when nothing is unpaid.
    pub fn batch_size(self, unpaid: usize) -> usize {
        if unpaid == 0 {
            return 0;
        }

        let size = (self.0 * unpaid as f64).floor();
        if size < 1.0 {
            1
        } else if size >= unpaid as f64 {
            unpaid
        } else {
            size as usize
        }
    }

    /// Shrinks the fraction after a batch of `failed_batch_len` records was
    /// rejected as `observed_size` against a limit of `reported_max`.
    ///
    /// The result always yields a batch at least one record smaller than the
    /// failed one over `unpaid` records. Returns `None` when the failed batch
    /// held a single record and cannot shrink any further.
    pub fn corrected(
        self,
        reported_max: u64,
        observed_size: u64,
        failed_batch_len: usize,
        unpaid: usize,
    ) -> Option<Self> {
        if failed_batch_len <= 1 || unpaid == 0 {
            return None;
        }

        let target = failed_batch_len - 1;
        let ratio = if observed_size == 0 {
            0.0
        } else {
            reported_max as f64 / observed_size as f64
        };

        let candidate = Self(self.0 * ratio);
        if candidate.0.is_finite() && candidate.0 > 0.0 && candidate.batch_size(unpaid) <= target {
            return Some(candidate);
        }

        Some(Self(target as f64 / unpaid as f64))
    }
}

impl Default for BatchSizeFraction {
    fn default() -> Self {
        Self::WHOLE
    }
}

impl fmt::Display for BatchSizeFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contiguous slice of unpaid records attempted as one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the current plan
    pub number: usize,
    /// Number of batches in the current plan
    pub total: usize,
    /// Indices into the payout store
    pub indices: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Partitions the unpaid records into ordered batches covering each exactly once
pub fn plan(unpaid: &[usize], fraction: BatchSizeFraction) -> Vec<Batch> {
    let size = fraction.batch_size(unpaid.len());
    if size == 0 {
        return Vec::new();
    }

    let total = unpaid.len().div_ceil(size);

    unpaid
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| Batch {
            number: i + 1,
            total,
            indices: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fraction(value: f64) -> BatchSizeFraction {
        BatchSizeFraction::new(value).unwrap()
    }

    #[test]
    fn test_rejects_invalid_fraction() {
        assert!(BatchSizeFraction::new(0.0).is_err());
        assert!(BatchSizeFraction::new(-0.5).is_err());
        assert!(BatchSizeFraction::new(f64::NAN).is_err());
        assert!(BatchSizeFraction::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_batch_size_clamps() {
        assert_eq!(fraction(1.0).batch_size(10), 10);
        assert_eq!(fraction(0.75).batch_size(10), 7);
        assert_eq!(fraction(0.01).batch_size(10), 1);
        assert_eq!(fraction(3.0).batch_size(10), 10);
        assert_eq!(fraction(0.5).batch_size(0), 0);
    }

    #[test]
    fn test_plan_covers_every_record_once() {
        let unpaid: Vec<usize> = vec![0, 2, 3, 5, 8, 9, 11];
        let batches = plan(&unpaid, fraction(0.5));

        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.total == 3));
        assert_eq!(batches[0].indices, vec![0, 2, 3]);
        assert_eq!(batches[1].indices, vec![5, 8, 9]);
        assert_eq!(batches[2].indices, vec![11]);

        let flattened: Vec<usize> = batches.into_iter().flat_map(|b| b.indices).collect();
        assert_eq!(flattened, unpaid);
    }

    #[test]
    fn test_plan_empty() {
        assert!(plan(&[], BatchSizeFraction::WHOLE).is_empty());
    }

    #[test]
    fn test_plan_numbers_batches_from_one() {
        let unpaid: Vec<usize> = (0..4).collect();
        let numbers: Vec<usize> = plan(&unpaid, fraction(0.25))
            .iter()
            .map(|b| b.number)
            .collect();

        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_corrected_applies_size_ratio() {
        let corrected = BatchSizeFraction::WHOLE
            .corrected(16384, 21861, 10, 10)
            .unwrap();

        assert!((corrected.value() - 16384.0 / 21861.0).abs() < 1e-12);
        assert_eq!(corrected.batch_size(10), 7);
    }

    #[test]
    fn test_corrected_forces_progress_when_ratio_rounds_back() {
        // 0.99 of 10 floors to 9 already, so the ratio alone is enough
        let corrected = BatchSizeFraction::WHOLE.corrected(99, 100, 10, 10).unwrap();
        assert_eq!(corrected.batch_size(10), 9);

        // observed below max would grow the fraction; the batch still shrinks
        let corrected = fraction(0.03).corrected(200, 100, 3, 100).unwrap();
        assert_eq!(corrected.batch_size(100), 2);
    }

    #[test]
    fn test_corrected_handles_zero_observed_size() {
        let corrected = BatchSizeFraction::WHOLE.corrected(16384, 0, 4, 4).unwrap();
        assert_eq!(corrected.batch_size(4), 3);
    }

    #[test]
    fn test_single_record_cannot_shrink() {
        assert!(fraction(0.1).corrected(100, 200, 1, 10).is_none());
    }

    #[test]
    fn test_shrink_converges_for_any_ratio() {
        let unpaid = 1000;
        let mut current = BatchSizeFraction::WHOLE;
        let mut size = current.batch_size(unpaid);
        let mut corrections = 0;

        // a limit that only a single record fits under, reported with a tiny overshoot
        while size > 1 {
            let next = current.corrected(1000, 1001, size, unpaid).unwrap();
            let next_size = next.batch_size(unpaid);

            assert!(next_size < size);
            current = next;
            size = next_size;
            corrections += 1;
        }

        assert!(corrections < unpaid);
    }
}
