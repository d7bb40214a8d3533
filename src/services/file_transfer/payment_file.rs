//! Payment file sent to the banking partner.

use crate::domain::{payload_digest, round_cents, CheckRunWorkflow, ProfitShareCheck};

pub const PAYMENT_FILE_HEADER: &str = "check_number,psc_check_id,ssn,payable_name,amount,tax_code,check_date";

/// Rendered payment file of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentFile {
    pub file_name: String,
    pub contents: Vec<u8>,
    pub digest: String,
    /// Live checks in the file.
    pub checks: usize,
}

impl PaymentFile {
    /// One line per live check, ordered by check number.
    pub fn build(run: &CheckRunWorkflow, checks: &[ProfitShareCheck]) -> Self {
        let mut live: Vec<&ProfitShareCheck> = checks.iter().filter(|c| c.is_live()).collect();
        live.sort_by_key(|c| c.check_number);
        let count = live.len();

        let mut out = String::from(PAYMENT_FILE_HEADER);
        out.push('\n');
        for check in live {
            out.push_str(&format!(
                "{},{},{},{},{:.2},{},{}\n",
                check.check_number,
                check.psc_check_id,
                check.ssn.masked(),
                csv_field(&check.payable_name),
                round_cents(check.check_amount),
                check.tax_code,
                check.check_date.format("%Y-%m-%d"),
            ));
        }

        let contents = out.into_bytes();
        Self {
            file_name: file_name(run),
            digest: payload_digest(&contents),
            contents,
            checks: count,
        }
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }
}

/// `PSCHECKS_<year>_<yyyymmdd>_<reprint>.csv`
pub fn file_name(run: &CheckRunWorkflow) -> String {
    format!(
        "PSCHECKS_{}_{}_{}.csv",
        run.profit_year,
        run.check_run_date.format("%Y%m%d"),
        run.reprint_count
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
