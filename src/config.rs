use batch_disburser::policy::MAX_DECIMALS;
use batch_disburser::simulated::SimulatedLedger;
use batch_disburser::DisbursementConfig;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How to treat native-currency payouts below the ledger's floor
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FloorPolicyChoice {
    /// Pay the floor amount instead
    Raise,
    /// Leave the recipient unpaid
    Exclude,
    /// Ask on the terminal for each recipient
    Prompt,
}

/// Trait for reading configuration parameters
pub trait Config {
    fn input_path(&self) -> &Path;
    fn floor_policy(&self) -> FloorPolicyChoice;
    fn disbursement(&self) -> DisbursementConfig;
    fn ledger(&self) -> SimulatedLedger;
}

/// CLI configuration
#[derive(Parser, Debug)]
#[command(
    name = "payout-disburser",
    about = "Pays a CSV list of recipients in size-limited transaction batches",
    version
)]
pub struct CliConfig {
    /// Path to the recipients CSV (address,token_id,amount[,transaction_id])
    #[arg(value_name = "INPUT_FILE")]
    input_file: PathBuf,

    /// Starting share of unpaid recipients per transaction
    #[arg(long, default_value_t = 1.0)]
    initial_fraction: f64,

    /// What to do with native payouts below --native-floor
    #[arg(long, value_enum, default_value_t = FloorPolicyChoice::Prompt)]
    floor_policy: FloorPolicyChoice,

    /// Smallest native amount per output, in smallest units
    #[arg(long, default_value_t = 1_000_000)]
    native_floor: u64,

    /// Decimal places of the native currency (at most 28)
    #[arg(
        long,
        default_value_t = 6,
        value_parser = clap::value_parser!(u32).range(..=i64::from(MAX_DECIMALS))
    )]
    native_decimals: u32,

    /// Seconds to wait for a transaction to become final
    #[arg(long, default_value_t = 600)]
    confirmation_timeout_secs: u64,

    /// Initial delay between confirmation checks, in milliseconds
    #[arg(long, default_value_t = 5_000)]
    poll_interval_ms: u64,

    /// Upper bound for the confirmation backoff, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    max_poll_interval_ms: u64,

    /// Maximum number of batch-size corrections before giving up
    #[arg(long, default_value_t = 32)]
    max_corrections: usize,

    /// Simulated ledger: maximum transaction size in bytes
    #[arg(long, default_value_t = 16_384)]
    max_tx_size: u64,

    /// Simulated ledger: fixed bytes per transaction
    #[arg(long, default_value_t = 400)]
    base_tx_size: u64,

    /// Simulated ledger: bytes per output
    #[arg(long, default_value_t = 150)]
    output_size: u64,
}

impl Config for CliConfig {
    fn input_path(&self) -> &Path {
        &self.input_file
    }

    fn floor_policy(&self) -> FloorPolicyChoice {
        self.floor_policy
    }

    fn disbursement(&self) -> DisbursementConfig {
        DisbursementConfig::default()
            .with_initial_fraction(self.initial_fraction)
            .with_native_floor(self.native_floor, self.native_decimals)
            .with_confirmation_timeout(Duration::from_secs(self.confirmation_timeout_secs))
            .with_polling(
                Duration::from_millis(self.poll_interval_ms),
                Duration::from_millis(self.max_poll_interval_ms),
            )
            .with_max_corrections(self.max_corrections)
    }

    fn ledger(&self) -> SimulatedLedger {
        SimulatedLedger::new()
            .with_max_tx_size(self.max_tx_size)
            .with_size_model(self.base_tx_size, self.output_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::try_parse_from(["payout-disburser", "payouts.csv"]).unwrap();

        assert_eq!(config.input_path(), Path::new("payouts.csv"));
        assert_eq!(config.floor_policy(), FloorPolicyChoice::Prompt);
        assert_eq!(config.disbursement().native_decimals, 6);
    }

    #[test]
    fn test_native_decimals_upper_bound() {
        let max = CliConfig::try_parse_from([
            "payout-disburser",
            "payouts.csv",
            "--native-decimals",
            "28",
        ])
        .unwrap();
        assert_eq!(max.disbursement().native_decimals, 28);

        let past_max = CliConfig::try_parse_from([
            "payout-disburser",
            "payouts.csv",
            "--native-decimals",
            "29",
        ]);
        assert!(past_max.is_err());
    }
}
