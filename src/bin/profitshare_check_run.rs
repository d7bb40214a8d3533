//! profitshare-check-run: drive one year-end check run
//!
//! ```text
//! profitshare-check-run <profit-year> <yyyy-mm-dd> <payees.yaml>
//! ```
//!
//! Loads configuration, opens storage, then takes the run for the given
//! profit year and date through balance calculation, numbering, printing
//! and transfer to the filesystem outbox, and waits for confirmation.
//!
//! ## Configuration
//! - PROFITSHARE_CONFIG: config file path (default: config.yaml)
//! - PROFITSHARE__*: overrides, e.g. PROFITSHARE__STORAGE__TYPE=sqlite
//! - PROFITSHARE_LOG / PROFITSHARE_LOG_FORMAT: log filter and format

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{error, info};
use uuid::Uuid;

use profitshare::config::Config;
use profitshare::domain::{Actor, CheckRunStep, CheckRunWorkflow, PayeeLine, ProfitYear};
use profitshare::services::check_run::Result as RunResult;
use profitshare::services::{CheckRunService, FilesystemTransport};
use profitshare::storage::init_storage;
use profitshare::utils::bootstrap::init_tracing;

const USAGE: &str = "usage: profitshare-check-run <profit-year> <yyyy-mm-dd> <payees.yaml>";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [year, date, payees_path] = args.as_slice() else {
        return Err(USAGE.into());
    };
    let profit_year: ProfitYear = year.parse().map_err(|e| format!("invalid profit year {year}: {e}"))?;
    let check_run_date =
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| format!("invalid check run date {date}: {e}"))?;
    let payees: Vec<PayeeLine> = serde_yaml::from_str(&tokio::fs::read_to_string(payees_path).await?)?;

    let config = Config::load(None)?;
    let storage = init_storage(&config.storage).await?;
    let transport = FilesystemTransport::new(&config.check_run.outbox_dir);
    let timeout = config.check_run.confirmation_timeout();
    let service = CheckRunService::new(&storage, config.check_run, config.transfer_retry);
    let actor = Actor::system();

    let run = match service.active_run(profit_year, check_run_date).await? {
        Some(run) => run,
        None => service.start_run(profit_year, check_run_date, &actor).await?,
    };
    info!(run_id = %run.id, step = %run.step, payees = payees.len(), "Driving check run");

    let result = drive(&service, run.id, payees, &transport, timeout, &actor).await;

    match result {
        Ok(run) => {
            info!(run_id = %run.id, reprint_count = run.reprint_count, "Check run confirmed");
            Ok(())
        }
        Err(e) => {
            error!(run_id = %run.id, error = %e, retryable = e.is_retryable(), "Check run stopped");
            Err(e.into())
        }
    }
}

/// Advance the run from whatever step it is at, so an interrupted run resumes.
async fn drive(
    service: &CheckRunService,
    run_id: Uuid,
    payees: Vec<PayeeLine>,
    transport: &FilesystemTransport,
    timeout: Duration,
    actor: &Actor,
) -> RunResult<CheckRunWorkflow> {
    let mut payees = Some(payees);
    loop {
        let run = service.get(run_id).await?;
        match run.step {
            CheckRunStep::Created => {
                service
                    .calculate_balances(run_id, payees.take().unwrap_or_default(), actor)
                    .await?;
            }
            CheckRunStep::BalancesCalculated => {
                service.number_checks(run_id, actor).await?;
            }
            CheckRunStep::ChecksNumbered if run.awaiting_check_block() => {
                service.number_checks(run_id, actor).await?;
            }
            CheckRunStep::ChecksNumbered => {
                service.mark_printed(run_id, actor).await?;
            }
            CheckRunStep::Printed => {
                service.transfer(run_id, transport, actor).await?;
            }
            CheckRunStep::Transferred => return service.await_confirmation(run_id, timeout, actor).await,
            CheckRunStep::Confirmed => return Ok(run),
        }
    }
}
