//! In-memory ledger with a linear transaction size model.
//!
//! Used for dry runs from the command line and as the ledger behind the
//! crate's tests. Failures can be scripted per stage.

use crate::ledger::{
    ConfirmationHandle, ConfirmationStatus, LedgerClient, LedgerError, RequiredTotals,
    TransferOutput,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Inputs reserved by [`SimulatedLedger::select_inputs`]
#[derive(Debug, Clone)]
pub struct SelectedInputs {
    pub totals: RequiredTotals,
}

/// A built (and later signed) transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedTransaction {
    pub id: String,
    pub outputs: Vec<TransferOutput>,
    pub size: u64,
    spends: RequiredTotals,
}

#[derive(Debug)]
pub struct SignedTransaction(SimulatedTransaction);

#[derive(Debug)]
struct Pending {
    errors_left: usize,
    polls_left: Option<usize>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: Option<BTreeMap<String, u64>>,
    built: usize,
    build_attempts: Vec<usize>,
    submitted: Vec<SimulatedTransaction>,
    pending: HashMap<String, Pending>,
    status_queries: usize,
}

#[derive(Debug)]
pub struct SimulatedLedger {
    max_tx_size: u64,
    base_size: u64,
    output_size: u64,
    confirmation_polls: Option<usize>,
    status_errors: usize,
    reject_signing: bool,
    fail_submission_at: Option<usize>,
    state: Mutex<LedgerState>,
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self {
            max_tx_size: 16_384,
            base_size: 400,
            output_size: 150,
            confirmation_polls: Some(0),
            status_errors: 0,
            reject_signing: false,
            fail_submission_at: None,
            state: Mutex::new(LedgerState::default()),
        }
    }
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tx_size(mut self, max_tx_size: u64) -> Self {
        self.max_tx_size = max_tx_size;
        self
    }

    /// Transaction size = `base_size + output_size × outputs`
    pub fn with_size_model(mut self, base_size: u64, output_size: u64) -> Self {
        self.base_size = base_size;
        self.output_size = output_size;
        self
    }

    /// Pending responses before a submitted transaction reports final
    pub fn with_confirmation_polls(mut self, polls: usize) -> Self {
        self.confirmation_polls = Some(polls);
        self
    }

    pub fn never_confirm(mut self) -> Self {
        self.confirmation_polls = None;
        self
    }

    /// Failed status queries before each transaction becomes visible
    pub fn with_status_errors(mut self, errors: usize) -> Self {
        self.status_errors = errors;
        self
    }

    pub fn rejecting_signatures(mut self) -> Self {
        self.reject_signing = true;
        self
    }

    /// Fails the `n`-th submission (1-based)
    pub fn failing_submission(mut self, n: usize) -> Self {
        self.fail_submission_at = Some(n);
        self
    }

    /// Tracks balances; without this funds are unlimited
    pub fn with_balance(self, token_id: impl Into<String>, amount: u64) -> Self {
        self.state
            .lock()
            .balances
            .get_or_insert_with(BTreeMap::new)
            .insert(token_id.into(), amount);
        self
    }

    pub fn transaction_size(&self, outputs: usize) -> u64 {
        self.base_size
            .saturating_add(self.output_size.saturating_mul(outputs as u64))
    }

    /// Every submitted transaction, in submission order
    pub fn submitted(&self) -> Vec<SimulatedTransaction> {
        self.state.lock().submitted.clone()
    }

    /// Output count of every build attempt, including oversize ones
    pub fn build_attempts(&self) -> Vec<usize> {
        self.state.lock().build_attempts.clone()
    }

    pub fn status_queries(&self) -> usize {
        self.state.lock().status_queries
    }

    pub fn balance(&self, token_id: &str) -> Option<u64> {
        self.state
            .lock()
            .balances
            .as_ref()
            .map(|b| b.get(token_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    type Inputs = SelectedInputs;
    type UnsignedTx = SimulatedTransaction;
    type SignedTx = SignedTransaction;

    async fn select_inputs(&self, required: &RequiredTotals) -> Result<SelectedInputs, LedgerError> {
        let state = self.state.lock();

        if let Some(balances) = &state.balances {
            for (token_id, &amount) in required {
                let available = balances.get(token_id).copied().unwrap_or(0);
                if available < amount {
                    return Err(LedgerError::InsufficientFunds {
                        token_id: token_id.clone(),
                        required: amount,
                        available,
                    });
                }
            }
        }

        Ok(SelectedInputs {
            totals: required.clone(),
        })
    }

    async fn build(
        &self,
        inputs: SelectedInputs,
        outputs: Vec<TransferOutput>,
    ) -> Result<SimulatedTransaction, LedgerError> {
        let mut state = self.state.lock();
        state.build_attempts.push(outputs.len());

        let size = self.transaction_size(outputs.len());
        if size > self.max_tx_size {
            return Err(LedgerError::Oversize {
                reported_max: self.max_tx_size,
                observed_size: size,
            });
        }

        state.built += 1;
        let id = format!("sim-{:08}", state.built);
        debug!("Built {id}: {} outputs, {size} bytes", outputs.len());

        Ok(SimulatedTransaction {
            id,
            outputs,
            size,
            spends: inputs.totals,
        })
    }

    async fn sign(&self, tx: SimulatedTransaction) -> Result<SignedTransaction, LedgerError> {
        if self.reject_signing {
            return Err(LedgerError::SigningRejected(format!("{} declined", tx.id)));
        }

        Ok(SignedTransaction(tx))
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<ConfirmationHandle, LedgerError> {
        let SignedTransaction(tx) = tx;
        let mut state = self.state.lock();

        if self.fail_submission_at == Some(state.submitted.len() + 1) {
            return Err(LedgerError::Submission(format!("{} rejected by node", tx.id)));
        }

        if let Some(balances) = state.balances.as_mut() {
            for (token_id, amount) in &tx.spends {
                let balance = balances.entry(token_id.clone()).or_insert(0);
                *balance = balance.saturating_sub(*amount);
            }
        }

        state.pending.insert(
            tx.id.clone(),
            Pending {
                errors_left: self.status_errors,
                polls_left: self.confirmation_polls,
            },
        );
        let handle = ConfirmationHandle(tx.id.clone());
        state.submitted.push(tx);

        Ok(handle)
    }

    async fn confirmation_status(
        &self,
        handle: &ConfirmationHandle,
    ) -> Result<ConfirmationStatus, LedgerError> {
        let mut state = self.state.lock();
        state.status_queries += 1;

        let pending = state
            .pending
            .get_mut(&handle.0)
            .ok_or_else(|| LedgerError::Confirmation(format!("unknown transaction {handle}")))?;

        if pending.errors_left > 0 {
            pending.errors_left -= 1;
            return Err(LedgerError::Confirmation(format!("{handle} not found")));
        }

        match pending.polls_left.as_mut() {
            None => Ok(ConfirmationStatus::Pending),
            Some(0) => Ok(ConfirmationStatus::Final(handle.0.clone())),
            Some(left) => {
                *left -= 1;
                Ok(ConfirmationStatus::Pending)
            }
        }
    }
}
