use crate::config::DisbursementConfig;
use crate::error::DisbursementError;
use crate::ledger::{LedgerClient, RequiredTotals, TransferOutput};
use crate::payout::{PayoutStore, Settlement};
use crate::planner::Batch;
use crate::policy::{FloorDecision, FloorPolicy};
use crate::progress::ProgressReporter;
use tracing::{debug, warn};

/// An unsigned transaction and the records it will settle once confirmed
#[derive(Debug)]
pub struct Assembled<T> {
    pub tx: T,
    pub settlements: Vec<Settlement>,
    /// Records left out by the floor policy
    pub excluded: Vec<usize>,
}

/// Outputs for a batch after the floor policy has been applied
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Transfers {
    pub outputs: Vec<TransferOutput>,
    pub settlements: Vec<Settlement>,
    pub excluded: Vec<usize>,
}

impl Transfers {
    pub fn required_totals(&self) -> Result<RequiredTotals, DisbursementError> {
        let mut totals = RequiredTotals::new();

        for output in &self.outputs {
            let total = totals.entry(output.token_id.clone()).or_insert(0);
            *total = total
                .checked_add(output.amount)
                .ok_or_else(|| DisbursementError::AmountOverflow {
                    token_id: output.token_id.clone(),
                })?;
        }

        Ok(totals)
    }
}

pub(crate) fn transfers<P: FloorPolicy + ?Sized>(
    store: &PayoutStore,
    batch: &Batch,
    policy: &P,
    config: &DisbursementConfig,
    progress: &dyn ProgressReporter,
) -> Transfers {
    let mut transfers = Transfers::default();

    for &index in &batch.indices {
        let Some(record) = store.record(index) else {
            continue;
        };

        let mut amount = record.amount;
        if record.is_native() && amount < config.native_floor {
            match policy.decide(&record.address, amount, config.native_floor) {
                FloorDecision::RaiseToFloor => {
                    debug!(
                        "Raising payout to {} from {amount} to {}",
                        record.address, config.native_floor
                    );
                    amount = config.native_floor;
                }
                FloorDecision::Exclude => {
                    warn!(
                        "Excluding {} from batch {}: {amount} is below the floor of {}",
                        record.address, batch.number, config.native_floor
                    );
                    progress.report(
                        &format!("Excluded {} (below minimum amount)", record.address),
                        batch.number,
                        batch.total,
                    );
                    transfers.excluded.push(index);
                    continue;
                }
            }
        }

        transfers.outputs.push(TransferOutput {
            address: record.address.clone(),
            token_id: record.token_id.clone(),
            amount,
        });
        transfers.settlements.push(Settlement { index, amount });
    }

    transfers
}

/// Builds the unsigned transaction for one batch.
///
/// Returns `None` when the floor policy excluded every record. A build
/// rejected for size surfaces as `LedgerError::Oversize` inside
/// `DisbursementError::Ledger`.
pub async fn assemble<L, P>(
    ledger: &L,
    store: &PayoutStore,
    batch: &Batch,
    policy: &P,
    config: &DisbursementConfig,
    progress: &dyn ProgressReporter,
) -> Result<Option<Assembled<L::UnsignedTx>>, DisbursementError>
where
    L: LedgerClient,
    P: FloorPolicy + ?Sized,
{
    let transfers = transfers(store, batch, policy, config, progress);
    if transfers.outputs.is_empty() {
        return Ok(None);
    }

    let required = transfers.required_totals()?;
    let inputs = ledger.select_inputs(&required).await?;
    let tx = ledger.build(inputs, transfers.outputs).await?;

    Ok(Some(Assembled {
        tx,
        settlements: transfers.settlements,
        excluded: transfers.excluded,
    }))
}
