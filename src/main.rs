mod config;
mod prompt;

use anyhow::{bail, Context, Result};
use batch_disburser::{Cancellation, Disburser, PayoutRecord};
use clap::Parser;
use config::{CliConfig, Config};
use prompt::CliPolicy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = CliConfig::parse();

    process_payouts(&config).await?;

    info!("Disbursement completed successfully");

    Ok(())
}

async fn process_payouts<C: Config>(config: &C) -> Result<()> {
    let recipients = read_recipients(config.input_path())?;
    let settings = config.disbursement();
    let policy = CliPolicy::new(config.floor_policy(), settings.native_decimals);

    let (cancel, cancellation) = Cancellation::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            cancel.cancel();
        }
    });

    let disburser =
        Disburser::new(config.ledger(), policy, settings).with_cancellation(cancellation);
    let progress = |message: &str, batch: usize, total: usize| {
        if total == 0 {
            info!("{message}");
        } else {
            info!("{message} ({batch}/{total})");
        }
    };

    match disburser.disburse(recipients, &progress).await {
        Ok(records) => {
            let unpaid = records.iter().filter(|r| !r.is_paid()).count();
            info!("Paid {} records, {unpaid} left unpaid", records.len() - unpaid);

            write_report(io::stdout().lock(), &records, &[], None)
        }
        Err(failure) => {
            let handle = failure.error.in_flight_handle();
            for record in failure.in_flight_records() {
                warn!(
                    "{} may have been paid by {}",
                    record.address,
                    handle.unwrap_or("an unconfirmed transaction")
                );
            }
            write_report(io::stdout().lock(), &failure.records, &failure.in_flight, handle)?;

            Err(failure).context("Disbursement aborted; the report lists what was paid")
        }
    }
}

/// CSV row as read back from a report
#[derive(Debug, Deserialize)]
struct InputRow {
    address: String,
    token_id: String,
    amount: u64,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    in_flight: Option<String>,
}

/// CSV row of the report; `in_flight` names a submitted but unconfirmed transaction
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    address: &'a str,
    token_id: &'a str,
    amount: u64,
    transaction_id: Option<&'a str>,
    in_flight: Option<&'a str>,
}

fn read_recipients(path: &Path) -> Result<Vec<PayoutRecord>> {
    let file = File::open(path).context("Failed to open input file")?;

    parse_recipients(file)
}

/// Rejects the whole file on the first bad row, so no recipient is dropped
/// from the report
fn parse_recipients<R: io::Read>(input: R) -> Result<Vec<PayoutRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);
    let headers = reader.headers().context("Failed to read header")?.clone();

    let mut recipients: Vec<PayoutRecord> = Vec::new();
    let mut raw = csv::StringRecord::new();

    while reader
        .read_record(&mut raw)
        .with_context(|| format!("Failed to read line {}", reader.position().line()))?
    {
        let line = raw.position().map_or(0, csv::Position::line);
        let row: InputRow = raw
            .deserialize(Some(&headers))
            .with_context(|| format!("Invalid recipient on line {line}"))?;

        if let (Some(handle), None) = (&row.in_flight, &row.transaction_id) {
            bail!(
                "Recipient {} on line {line} is in flight under {handle}; \
                 set its transaction_id once confirmed, or clear in_flight if it never settled",
                row.address
            );
        }

        let mut record = PayoutRecord::new(row.address, row.token_id, row.amount);
        record.transaction_id = row.transaction_id;
        recipients.push(record);
    }

    let already_paid = recipients.iter().filter(|r| r.is_paid()).count();
    info!(
        "Loaded {} recipients ({already_paid} already paid)",
        recipients.len()
    );

    Ok(recipients)
}

fn write_report<W: io::Write>(
    output: W,
    records: &[PayoutRecord],
    in_flight: &[usize],
    handle: Option<&str>,
) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_writer(output);

    for (index, record) in records.iter().enumerate() {
        let row = ReportRow {
            address: &record.address,
            token_id: &record.token_id,
            amount: record.amount,
            transaction_id: record.transaction_id.as_deref(),
            in_flight: handle.filter(|_| in_flight.contains(&index)),
        };
        writer.serialize(row).context("Failed to serialize record")?;
    }

    writer.flush().context("Failed to flush report")?;

    Ok(())
}
