use crate::assembler::assemble;
use crate::cancellation::Cancellation;
use crate::config::DisbursementConfig;
use crate::confirmation::ConfirmationWaiter;
use crate::error::{DisbursementError, DisbursementFailure};
use crate::ledger::{LedgerClient, LedgerError};
use crate::payout::{PayoutRecord, PayoutStore};
use crate::planner::{plan, Batch, BatchSizeFraction};
use crate::policy::FloorPolicy;
use crate::progress::{Phase, ProgressReporter};
use tracing::{debug, error, info, instrument, warn};

/// How a single planning pass ended
enum PassOutcome {
    /// Every planned batch settled or was skipped
    Complete(PayoutStore),
    /// A batch failed to build for size; the store holds all earlier batches
    Oversize {
        store: PayoutStore,
        failed: Batch,
        reported_max: u64,
        observed_size: u64,
    },
    Failed {
        store: PayoutStore,
        error: DisbursementError,
        in_flight: Vec<usize>,
    },
}

enum BatchError {
    Oversize { reported_max: u64, observed_size: u64 },
    Fatal(DisbursementError),
    /// Submitted, then abandoned before the ledger reported it final
    InFlight {
        error: DisbursementError,
        records: Vec<usize>,
    },
}

impl From<DisbursementError> for BatchError {
    fn from(error: DisbursementError) -> Self {
        Self::Fatal(error)
    }
}

impl From<LedgerError> for BatchError {
    fn from(error: LedgerError) -> Self {
        Self::Fatal(error.into())
    }
}

/// Pays a recipient list through one or more size-limited transactions.
///
/// Batches are built, signed, submitted and confirmed strictly one after
/// another. A build rejected for size shrinks the batch-size fraction and
/// replans the records still unpaid; records settled by a confirmed batch
/// are never batched again.
pub struct Disburser<L, P> {
    ledger: L,
    policy: P,
    config: DisbursementConfig,
    waiter: ConfirmationWaiter,
    cancellation: Cancellation,
}

impl<L, P> Disburser<L, P>
where
    L: LedgerClient,
    P: FloorPolicy,
{
    pub fn new(ledger: L, policy: P, config: DisbursementConfig) -> Self {
        let waiter = ConfirmationWaiter::from_config(&config);

        Self {
            ledger,
            policy,
            config,
            waiter,
            cancellation: Cancellation::never(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Runs until every record is paid or a fatal error occurs.
    ///
    /// Records excluded by the floor policy may remain unpaid on success.
    /// On failure the returned [`DisbursementFailure`] holds every record,
    /// with those from confirmed batches marked paid.
    #[instrument(skip_all, fields(records = recipients.len()))]
    pub async fn disburse(
        &self,
        recipients: Vec<PayoutRecord>,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<PayoutRecord>, DisbursementFailure> {
        let mut fraction = match BatchSizeFraction::new(self.config.initial_fraction) {
            Ok(fraction) => fraction,
            Err(e) => return Err(DisbursementFailure::new(recipients, e)),
        };
        let mut store = PayoutStore::new(recipients);
        let mut corrections = 0;

        loop {
            match self.run_pass(store, fraction, progress).await {
                PassOutcome::Complete(store) => {
                    info!(
                        "Disbursement complete: {} records, {} unpaid",
                        store.len(),
                        store.unpaid_count()
                    );

                    return Ok(store.into_records());
                }
                PassOutcome::Failed {
                    store,
                    error,
                    in_flight,
                } => {
                    error!("Disbursement aborted: {error}");
                    if !in_flight.is_empty() {
                        warn!(
                            "{} records may settle under {}; reconcile them before resuming",
                            in_flight.len(),
                            error.in_flight_handle().unwrap_or("an unconfirmed transaction")
                        );
                    }

                    return Err(
                        DisbursementFailure::new(store.into_records(), error).with_in_flight(in_flight)
                    );
                }
                PassOutcome::Oversize {
                    store: next,
                    failed,
                    reported_max,
                    observed_size,
                } => {
                    debug!("{}", Phase::Retrying);
                    let unpaid = next.unpaid_count();

                    let Some(corrected) =
                        fraction.corrected(reported_max, observed_size, failed.len(), unpaid)
                    else {
                        let address = failed
                            .indices
                            .first()
                            .and_then(|&i| next.record(i))
                            .map(|r| r.address.clone())
                            .unwrap_or_default();
                        let error = DisbursementError::SingleRecordTooLarge {
                            address,
                            reported_max,
                            observed_size,
                        };
                        error!("Disbursement aborted: {error}");

                        return Err(DisbursementFailure::new(next.into_records(), error));
                    };

                    if corrections >= self.config.max_corrections {
                        let error = DisbursementError::RetryLimitExceeded { corrections };
                        error!("Disbursement aborted: {error}");

                        return Err(DisbursementFailure::new(next.into_records(), error));
                    }
                    corrections += 1;

                    info!(
                        "Transaction of {} records was {observed_size} bytes, limit {reported_max}; \
                         batch size {} -> {} of {unpaid} unpaid",
                        failed.len(),
                        failed.len(),
                        corrected.batch_size(unpaid)
                    );
                    progress.report(&format!("Trying batch size: {corrected}"), 0, 0);

                    fraction = corrected;
                    store = next;
                }
            }
        }
    }

    /// Plans the unpaid records and works through the batches in order
    async fn run_pass(
        &self,
        mut store: PayoutStore,
        fraction: BatchSizeFraction,
        progress: &dyn ProgressReporter,
    ) -> PassOutcome {
        let batches = plan(&store.unpaid(), fraction);
        debug!(
            "{}: {} batches at fraction {fraction}",
            Phase::Planning,
            batches.len()
        );

        for batch in batches {
            if self.cancellation.is_cancelled() {
                return PassOutcome::Failed {
                    store,
                    error: DisbursementError::Cancelled { in_flight: None },
                    in_flight: Vec::new(),
                };
            }

            match self.process_batch(&mut store, &batch, progress).await {
                Ok(()) => {}
                Err(BatchError::Oversize {
                    reported_max,
                    observed_size,
                }) => {
                    return PassOutcome::Oversize {
                        store,
                        failed: batch,
                        reported_max,
                        observed_size,
                    };
                }
                Err(BatchError::Fatal(error)) => {
                    return PassOutcome::Failed {
                        store,
                        error,
                        in_flight: Vec::new(),
                    }
                }
                Err(BatchError::InFlight { error, records }) => {
                    return PassOutcome::Failed {
                        store,
                        error,
                        in_flight: records,
                    }
                }
            }
        }

        PassOutcome::Complete(store)
    }

    #[instrument(skip_all, fields(batch = batch.number, total = batch.total, records = batch.len()))]
    async fn process_batch(
        &self,
        store: &mut PayoutStore,
        batch: &Batch,
        progress: &dyn ProgressReporter,
    ) -> Result<(), BatchError> {
        Self::enter(Phase::Building, batch, progress);
        let assembled = match assemble(
            &self.ledger,
            store,
            batch,
            &self.policy,
            &self.config,
            progress,
        )
        .await
        {
            Ok(Some(assembled)) => assembled,
            Ok(None) => {
                info!("Batch {} skipped: every record was excluded", batch.number);
                return Ok(());
            }
            Err(DisbursementError::Ledger(LedgerError::Oversize {
                reported_max,
                observed_size,
            })) => {
                return Err(BatchError::Oversize {
                    reported_max,
                    observed_size,
                })
            }
            Err(e) => return Err(e.into()),
        };

        Self::enter(Phase::AwaitingSignature, batch, progress);
        let signed = self.ledger.sign(assembled.tx).await?;

        Self::enter(Phase::Submitting, batch, progress);
        let handle = self.ledger.submit(signed).await?;

        Self::enter(Phase::AwaitingConfirmation, batch, progress);
        let transaction_id = match self
            .waiter
            .wait(&self.ledger, &handle, &self.cancellation)
            .await
        {
            Ok(transaction_id) => transaction_id,
            Err(error) => {
                return Err(BatchError::InFlight {
                    error,
                    records: assembled.settlements.iter().map(|s| s.index).collect(),
                })
            }
        };

        store.mark_paid(&assembled.settlements, &transaction_id)?;
        info!(
            "Batch {}/{} confirmed in {transaction_id}: {} paid, {} excluded",
            batch.number,
            batch.total,
            assembled.settlements.len(),
            assembled.excluded.len()
        );
        Self::enter(Phase::Advancing, batch, progress);

        Ok(())
    }

    fn enter(phase: Phase, batch: &Batch, progress: &dyn ProgressReporter) {
        debug!("Batch {}/{}: {phase}", batch.number, batch.total);
        progress.report(phase.label(), batch.number, batch.total);
    }
}
