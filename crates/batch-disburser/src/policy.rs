use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What to do with a native-currency payout below the ledger's floor amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloorDecision {
    /// Pay the floor amount instead, increasing the total payout
    RaiseToFloor,
    /// Leave the record out of this batch; it stays unpaid
    Exclude,
}

/// Caller-supplied decision for sub-floor native payouts
pub trait FloorPolicy: Send + Sync {
    fn decide(&self, address: &str, requested: u64, floor: u64) -> FloorDecision;
}

/// The same decision for every record
impl FloorPolicy for FloorDecision {
    fn decide(&self, _address: &str, _requested: u64, _floor: u64) -> FloorDecision {
        *self
    }
}

impl<F> FloorPolicy for F
where
    F: Fn(&str, u64, u64) -> FloorDecision + Send + Sync,
{
    fn decide(&self, address: &str, requested: u64, floor: u64) -> FloorDecision {
        self(address, requested, floor)
    }
}

/// Most decimal places a [`Decimal`] can represent
pub const MAX_DECIMALS: u32 = 28;

/// Converts smallest units into whole units of an asset with `decimals` places
///
/// Digits beyond [`MAX_DECIMALS`] places are truncated.
pub fn to_whole_units(amount: u64, decimals: u32) -> Decimal {
    let excess = decimals.saturating_sub(MAX_DECIMALS);
    let mantissa = 10u64.checked_pow(excess).map_or(0, |divisor| amount / divisor);

    Decimal::from_i128_with_scale(i128::from(mantissa), decimals.min(MAX_DECIMALS))
}

/// Human-readable explanation of a sub-floor payout, for interactive policies
pub fn sub_floor_notice(address: &str, requested: u64, floor: u64, decimals: u32) -> String {
    let assigned = to_whole_units(requested, decimals).round_dp(2);
    let minimum = to_whole_units(floor, decimals).normalize();

    format!(
        "The ledger requires at least {minimum} per output.\n\n\
         This wallet has only {assigned:.2} assigned to it:\n{address}\n\n\
         Raise the payout for this wallet to {minimum}, or exclude it from the transaction.\n\
         Note: raising will increase the total payout amount."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_decision() {
        assert_eq!(
            FloorDecision::Exclude.decide("addr", 1, 1_000_000),
            FloorDecision::Exclude
        );
        assert_eq!(
            FloorDecision::RaiseToFloor.decide("addr", 1, 1_000_000),
            FloorDecision::RaiseToFloor
        );
    }

    #[test]
    fn test_closure_policy() {
        let policy = |address: &str, requested: u64, _floor: u64| {
            if address == "vip" || requested > 500_000 {
                FloorDecision::RaiseToFloor
            } else {
                FloorDecision::Exclude
            }
        };

        assert_eq!(policy.decide("vip", 1, 1_000_000), FloorDecision::RaiseToFloor);
        assert_eq!(policy.decide("other", 600_000, 1_000_000), FloorDecision::RaiseToFloor);
        assert_eq!(policy.decide("other", 1, 1_000_000), FloorDecision::Exclude);
    }

    #[test]
    fn test_to_whole_units() {
        assert_eq!(to_whole_units(1_500_000, 6), Decimal::new(15, 1));
        assert_eq!(to_whole_units(42, 0), Decimal::from(42));
    }

    #[test]
    fn test_to_whole_units_past_max_decimals() {
        assert_eq!(to_whole_units(1_500, 28), Decimal::new(15, 26));
        assert_eq!(to_whole_units(1_500, 30), Decimal::new(15, 28));
        assert_eq!(to_whole_units(u64::MAX, 60), Decimal::ZERO);
        assert!(to_whole_units(5_000_000, 29) < Decimal::ONE);
    }

    #[test]
    fn test_sub_floor_notice() {
        let notice = sub_floor_notice("addr_test1", 456_789, 1_000_000, 6);

        assert!(notice.contains("only 0.46 assigned"));
        assert!(notice.contains("at least 1 per output"));
        assert!(notice.contains("addr_test1"));
    }
}
