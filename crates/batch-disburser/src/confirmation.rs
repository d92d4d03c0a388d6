use crate::cancellation::Cancellation;
use crate::config::DisbursementConfig;
use crate::error::DisbursementError;
use crate::ledger::{ConfirmationHandle, ConfirmationStatus, LedgerClient};
use std::time::Duration;
use tracing::{debug, warn};

/// Polls a submitted transaction until the ledger reports it final
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationWaiter {
    timeout: Duration,
    poll_interval: Duration,
    max_poll_interval: Duration,
}

impl ConfirmationWaiter {
    pub fn new(timeout: Duration, poll_interval: Duration, max_poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            max_poll_interval: max_poll_interval.max(poll_interval),
        }
    }

    pub fn from_config(config: &DisbursementConfig) -> Self {
        Self::new(
            config.confirmation_timeout,
            config.poll_interval,
            config.max_poll_interval,
        )
    }

    /// Returns the final transaction id.
    ///
    /// Fails with `ConfirmationTimeout` once the timeout elapses and with
    /// `Cancelled` (carrying the handle) if the run is cancelled meanwhile.
    pub async fn wait<L: LedgerClient>(
        &self,
        ledger: &L,
        handle: &ConfirmationHandle,
        cancellation: &Cancellation,
    ) -> Result<String, DisbursementError> {
        tokio::select! {
            polled = tokio::time::timeout(self.timeout, self.poll(ledger, handle)) => {
                polled.map_err(|_| DisbursementError::ConfirmationTimeout {
                    handle: handle.to_string(),
                    timeout: self.timeout,
                })
            }
            () = cancellation.cancelled() => Err(DisbursementError::Cancelled {
                in_flight: Some(handle.to_string()),
            }),
        }
    }

    async fn poll<L: LedgerClient>(&self, ledger: &L, handle: &ConfirmationHandle) -> String {
        let mut interval = self.poll_interval;

        loop {
            match ledger.confirmation_status(handle).await {
                Ok(ConfirmationStatus::Final(transaction_id)) => return transaction_id,
                Ok(ConfirmationStatus::Pending) => {
                    debug!("Transaction {handle} pending, next check in {interval:?}");
                }
                // not yet visible to the ledger's index; keep polling until the timeout
                Err(e) => warn!("Confirmation check for {handle} failed: {e}"),
            }

            tokio::time::sleep(interval).await;
            interval = interval.saturating_mul(2).min(self.max_poll_interval);
        }
    }
}
