use crate::ledger::LedgerError;
use crate::payout::PayoutRecord;
use std::time::Duration;
use thiserror::Error;

/// Fatal outcome of a disbursement run
#[derive(Error, Debug)]
pub enum DisbursementError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transaction {handle} not confirmed within {timeout:?}")]
    ConfirmationTimeout { handle: String, timeout: Duration },

    #[error("Run cancelled{}", awaiting_suffix(.in_flight))]
    Cancelled {
        /// Submitted but unconfirmed transaction, if cancellation hit during polling
        in_flight: Option<String>,
    },

    #[error("Payout to {address} alone exceeds the maximum transaction size of {reported_max} (found {observed_size})")]
    SingleRecordTooLarge {
        address: String,
        reported_max: u64,
        observed_size: u64,
    },

    #[error("Batch size did not converge after {corrections} corrections")]
    RetryLimitExceeded { corrections: usize },

    #[error("Batch size fraction must be finite and positive, got {0}")]
    InvalidFraction(f64),

    #[error("Required total for {token_id} overflows")]
    AmountOverflow { token_id: String },

    #[error("Record {index} already carries transaction {transaction_id}")]
    AlreadyPaid {
        index: usize,
        transaction_id: String,
    },
}

fn awaiting_suffix(in_flight: &Option<String>) -> String {
    in_flight
        .as_ref()
        .map(|handle| format!(" with transaction {handle} awaiting confirmation"))
        .unwrap_or_default()
}

impl DisbursementError {
    /// Transaction that was submitted but never observed final
    pub fn in_flight_handle(&self) -> Option<&str> {
        match self {
            Self::ConfirmationTimeout { handle, .. } => Some(handle),
            Self::Cancelled { in_flight } => in_flight.as_deref(),
            _ => None,
        }
    }
}

/// A fatal error together with every record as it stood when the run stopped
///
/// Records from batches confirmed before the failure carry their
/// `transaction_id`, so the caller can resume with the unpaid remainder.
/// Records of a batch that was submitted but not confirmed are listed in
/// `in_flight`; they are unpaid here but may settle on the ledger, and must
/// be reconciled before a resume.
#[derive(Error, Debug)]
#[error("Disbursement aborted after paying {paid} of {total} records: {error}")]
pub struct DisbursementFailure {
    pub records: Vec<PayoutRecord>,
    #[source]
    pub error: DisbursementError,
    pub in_flight: Vec<usize>,
    paid: usize,
    total: usize,
}

impl DisbursementFailure {
    pub fn new(records: Vec<PayoutRecord>, error: DisbursementError) -> Self {
        let paid = records.iter().filter(|r| r.is_paid()).count();
        let total = records.len();

        Self {
            records,
            error,
            in_flight: Vec::new(),
            paid,
            total,
        }
    }

    pub fn with_in_flight(mut self, indices: Vec<usize>) -> Self {
        self.in_flight = indices;
        self
    }

    pub fn in_flight_records(&self) -> impl Iterator<Item = &PayoutRecord> {
        self.in_flight.iter().filter_map(|&i| self.records.get(i))
    }

    pub fn paid_count(&self) -> usize {
        self.paid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_names_in_flight_transaction() {
        let idle = DisbursementError::Cancelled { in_flight: None };
        let polling = DisbursementError::Cancelled {
            in_flight: Some("sim-00000001".to_string()),
        };

        assert_eq!(idle.to_string(), "Run cancelled");
        assert_eq!(
            polling.to_string(),
            "Run cancelled with transaction sim-00000001 awaiting confirmation"
        );
        assert_eq!(idle.in_flight_handle(), None);
        assert_eq!(polling.in_flight_handle(), Some("sim-00000001"));
    }

    #[test]
    fn test_timeout_reports_in_flight_transaction() {
        let error = DisbursementError::ConfirmationTimeout {
            handle: "sim-00000002".to_string(),
            timeout: Duration::from_secs(1),
        };

        assert_eq!(error.in_flight_handle(), Some("sim-00000002"));
    }

    #[test]
    fn test_in_flight_records_resolve_indices() {
        let records = vec![
            PayoutRecord::native("addr0", 1),
            PayoutRecord::native("addr1", 2),
            PayoutRecord::native("addr2", 3),
        ];
        let failure =
            DisbursementFailure::new(records, DisbursementError::Cancelled { in_flight: None })
                .with_in_flight(vec![0, 2]);

        let addresses: Vec<_> = failure.in_flight_records().map(|r| r.address.as_str()).collect();
        assert_eq!(addresses, ["addr0", "addr2"]);
        assert_eq!(failure.paid_count(), 0);
    }
}
