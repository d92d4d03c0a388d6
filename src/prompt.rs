use crate::config::FloorPolicyChoice;
use batch_disburser::policy::sub_floor_notice;
use batch_disburser::{FloorDecision, FloorPolicy};
use std::io::{self, BufRead, Write};
use tokio::runtime::RuntimeFlavor;
use tracing::warn;

/// Floor policy selected on the command line
pub enum CliPolicy {
    Fixed(FloorDecision),
    Prompt { decimals: u32 },
}

impl CliPolicy {
    pub fn new(choice: FloorPolicyChoice, decimals: u32) -> Self {
        match choice {
            FloorPolicyChoice::Raise => Self::Fixed(FloorDecision::RaiseToFloor),
            FloorPolicyChoice::Exclude => Self::Fixed(FloorDecision::Exclude),
            FloorPolicyChoice::Prompt => Self::Prompt { decimals },
        }
    }
}

impl FloorPolicy for CliPolicy {
    fn decide(&self, address: &str, requested: u64, floor: u64) -> FloorDecision {
        match self {
            Self::Fixed(decision) => *decision,
            Self::Prompt { decimals } => {
                let notice = sub_floor_notice(address, requested, floor, *decimals);

                match read_answer(&notice) {
                    Ok(decision) => decision,
                    Err(e) => {
                        warn!("Could not read answer, excluding {address}: {e}");
                        FloorDecision::Exclude
                    }
                }
            }
        }
    }
}

fn read_answer(notice: &str) -> io::Result<FloorDecision> {
    blocking(|| ask(notice, &mut io::stdin().lock(), &mut io::stderr()))
}

/// Runs a blocking call without stalling other tasks on a multi-threaded runtime
fn blocking<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

/// Only an explicit yes raises the payout
fn ask(notice: &str, input: &mut impl BufRead, output: &mut impl Write) -> io::Result<FloorDecision> {
    write!(output, "{notice}\n\nRaise the payout? [y/N] ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    Ok(match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => FloorDecision::RaiseToFloor,
        _ => FloorDecision::Exclude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_yes_raises() {
        let mut output = Vec::new();
        let decision = ask("notice", &mut "Yes\n".as_bytes(), &mut output).unwrap();

        assert_eq!(decision, FloorDecision::RaiseToFloor);
        assert!(String::from_utf8(output).unwrap().starts_with("notice"));
    }

    #[test]
    fn test_ask_defaults_to_exclude() {
        for answer in ["\n", "n\n", "maybe\n", ""] {
            let decision = ask("notice", &mut answer.as_bytes(), &mut Vec::new()).unwrap();
            assert_eq!(decision, FloorDecision::Exclude);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_call_on_worker_thread() {
        let decision = blocking(|| ask("notice", &mut "y\n".as_bytes(), &mut Vec::new())).unwrap();

        assert_eq!(decision, FloorDecision::RaiseToFloor);
    }

    #[tokio::test]
    async fn test_blocking_call_on_current_thread_runtime() {
        assert_eq!(blocking(|| 7), 7);
    }

    #[test]
    fn test_blocking_call_outside_runtime() {
        assert_eq!(blocking(|| 7), 7);
    }

    #[test]
    fn test_fixed_choices() {
        let raise = CliPolicy::new(FloorPolicyChoice::Raise, 6);
        let exclude = CliPolicy::new(FloorPolicyChoice::Exclude, 6);

        assert_eq!(raise.decide("addr", 1, 10), FloorDecision::RaiseToFloor);
        assert_eq!(exclude.decide("addr", 1, 10), FloorDecision::Exclude);
    }
}
