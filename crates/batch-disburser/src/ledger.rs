use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Required quantity per asset id, in smallest units
pub type RequiredTotals = BTreeMap<String, u64>;

/// A single value transfer inside a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutput {
    pub address: String,
    pub token_id: String,
    pub amount: u64,
}

/// Identifier returned by submission, polled until final
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfirmationHandle(pub String);

impl fmt::Display for ConfirmationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Pending,
    /// Observed final on the ledger under this transaction id
    Final(String),
}

/// Failures reported by a [`LedgerClient`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The built transaction is larger than the protocol allows.
    /// Recoverable: the batch is shrunk and retried.
    #[error("Maximum transaction size of {reported_max} exceeded. Found: {observed_size}")]
    Oversize {
        reported_max: u64,
        observed_size: u64,
    },

    #[error("Insufficient funds for {token_id}: required {required}, available {available}")]
    InsufficientFunds {
        token_id: String,
        required: u64,
        available: u64,
    },

    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Confirmation query failed: {0}")]
    Confirmation(String),

    #[error("Build failed: {0}")]
    Build(String),
}

/// Capabilities the disbursement core needs from a wallet and its ledger
///
/// Calls are issued strictly one batch at a time; implementations may rely
/// on the inputs of a confirmed batch being spent before the next
/// `select_inputs`.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    type Inputs: Send;
    type UnsignedTx: Send;
    type SignedTx: Send;

    /// Picks spendable inputs covering every required total
    async fn select_inputs(&self, required: &RequiredTotals) -> Result<Self::Inputs, LedgerError>;

    /// Serializes inputs and outputs; fails with [`LedgerError::Oversize`] past the size limit
    async fn build(
        &self,
        inputs: Self::Inputs,
        outputs: Vec<TransferOutput>,
    ) -> Result<Self::UnsignedTx, LedgerError>;

    /// May wait on interactive approval
    async fn sign(&self, tx: Self::UnsignedTx) -> Result<Self::SignedTx, LedgerError>;

    async fn submit(&self, tx: Self::SignedTx) -> Result<ConfirmationHandle, LedgerError>;

    /// Single non-blocking finality check
    async fn confirmation_status(
        &self,
        handle: &ConfirmationHandle,
    ) -> Result<ConfirmationStatus, LedgerError>;
}
