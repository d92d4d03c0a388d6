pub mod assembler;
pub mod cancellation;
pub mod config;
pub mod confirmation;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod payout;
pub mod planner;
pub mod policy;
pub mod progress;
pub mod simulated;

pub use cancellation::{CancelHandle, Cancellation};
pub use config::DisbursementConfig;
pub use engine::Disburser;
pub use error::{DisbursementError, DisbursementFailure};
pub use ledger::{LedgerClient, LedgerError};
pub use payout::{PayoutRecord, NATIVE_TOKEN_ID};
pub use policy::{FloorDecision, FloorPolicy};
pub use progress::ProgressReporter;

/// Pay `recipients` through `ledger` with default settings and the given starting fraction
pub async fn disburse<L, P>(
    ledger: L,
    recipients: Vec<PayoutRecord>,
    progress: &dyn ProgressReporter,
    policy: P,
    initial_fraction: f64,
) -> Result<Vec<PayoutRecord>, DisbursementFailure>
where
    L: LedgerClient,
    P: FloorPolicy,
{
    let config = DisbursementConfig::default().with_initial_fraction(initial_fraction);

    Disburser::new(ledger, policy, config)
        .disburse(recipients, progress)
        .await
}
