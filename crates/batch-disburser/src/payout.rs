use crate::error::DisbursementError;
use serde::{Deserialize, Serialize};

/// Token id reserved for the network's native currency
pub const NATIVE_TOKEN_ID: &str = "lovelace";

/// One requested payment, annotated once its transaction is confirmed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PayoutRecord {
    pub address: String,
    pub token_id: String,
    /// Quantity in the asset's smallest indivisible unit
    pub amount: u64,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PayoutRecord {
    pub fn new(address: impl Into<String>, token_id: impl Into<String>, amount: u64) -> Self {
        Self {
            address: address.into(),
            token_id: token_id.into(),
            amount,
            transaction_id: None,
        }
    }

    pub fn native(address: impl Into<String>, amount: u64) -> Self {
        Self::new(address, NATIVE_TOKEN_ID, amount)
    }

    pub fn is_native(&self) -> bool {
        self.token_id == NATIVE_TOKEN_ID
    }

    pub fn is_paid(&self) -> bool {
        self.transaction_id.is_some()
    }
}

/// What a confirmed batch actually paid one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub index: usize,
    pub amount: u64,
}

/// Ordered recipient list; records are only ever annotated, never removed
#[derive(Debug, Clone, Default)]
pub struct PayoutStore {
    records: Vec<PayoutRecord>,
}

impl PayoutStore {
    pub fn new(records: Vec<PayoutRecord>) -> Self {
        Self { records }
    }

    /// Indices of unpaid records, in original order
    pub fn unpaid(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| !record.is_paid())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn unpaid_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_paid()).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, index: usize) -> Option<&PayoutRecord> {
        self.records.get(index)
    }

    /// Marks every settled record as paid by `transaction_id`.
    ///
    /// Either all records are marked or none are: if any index is already
    /// paid the store is left untouched.
    pub fn mark_paid(
        &mut self,
        settlements: &[Settlement],
        transaction_id: &str,
    ) -> Result<(), DisbursementError> {
        for settlement in settlements {
            if let Some(existing) = self
                .records
                .get(settlement.index)
                .and_then(|r| r.transaction_id.as_ref())
            {
                return Err(DisbursementError::AlreadyPaid {
                    index: settlement.index,
                    transaction_id: existing.clone(),
                });
            }
        }

        for settlement in settlements {
            if let Some(record) = self.records.get_mut(settlement.index) {
                record.amount = settlement.amount;
                record.transaction_id = Some(transaction_id.to_owned());
            }
        }

        Ok(())
    }

    pub fn records(&self) -> &[PayoutRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<PayoutRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> PayoutStore {
        PayoutStore::new(vec![
            PayoutRecord::native("addr1", 5_000_000),
            PayoutRecord::new("addr2", "policy.token", 10),
            PayoutRecord::native("addr3", 2_000_000),
        ])
    }

    #[test]
    fn test_unpaid_preserves_order() {
        let mut store = store();
        assert_eq!(store.unpaid(), vec![0, 1, 2]);

        store
            .mark_paid(&[Settlement { index: 1, amount: 10 }], "tx1")
            .unwrap();

        assert_eq!(store.unpaid(), vec![0, 2]);
        assert_eq!(store.unpaid_count(), 2);
    }

    #[test]
    fn test_mark_paid_records_settled_amount() {
        let mut store = store();

        store
            .mark_paid(
                &[Settlement {
                    index: 2,
                    amount: 3_000_000,
                }],
                "tx1",
            )
            .unwrap();

        let record = store.record(2).unwrap();
        assert_eq!(record.amount, 3_000_000);
        assert_eq!(record.transaction_id.as_deref(), Some("tx1"));
    }

    #[test]
    fn test_mark_paid_never_overwrites() {
        let mut store = store();
        store
            .mark_paid(&[Settlement { index: 0, amount: 5_000_000 }], "tx1")
            .unwrap();

        let result = store.mark_paid(
            &[
                Settlement { index: 2, amount: 2_000_000 },
                Settlement { index: 0, amount: 5_000_000 },
            ],
            "tx2",
        );

        assert!(matches!(
            result,
            Err(DisbursementError::AlreadyPaid { index: 0, .. })
        ));
        // nothing from the rejected call was applied
        assert_eq!(store.record(0).unwrap().transaction_id.as_deref(), Some("tx1"));
        assert!(store.record(2).unwrap().transaction_id.is_none());
    }

    #[test]
    fn test_records_are_never_removed() {
        let mut store = store();
        let all: Vec<_> = store
            .unpaid()
            .into_iter()
            .map(|index| Settlement {
                index,
                amount: store.record(index).unwrap().amount,
            })
            .collect();

        store.mark_paid(&all, "tx1").unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.unpaid_count(), 0);
        assert!(store.records().iter().all(PayoutRecord::is_paid));
        assert_eq!(store.into_records().len(), 3);
    }
}
