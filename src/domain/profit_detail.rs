//! Ledger postings and the balances derived from them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::profit_code::ProfitCode;
use super::ssn::Ssn;
use super::tax_code::TaxCode;
use super::ProfitYear;

/// Largest magnitude a DECIMAL(9,2) column holds.
const MAX_AMOUNT: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 2);

/// Round half away from zero to whole cents.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Uniqueness key of a posting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostingKey {
    pub ssn: Ssn,
    pub profit_year: ProfitYear,
    pub profit_code: ProfitCode,
    pub distribution_sequence: i32,
}

impl std::fmt::Display for PostingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.ssn, self.profit_year, self.profit_code, self.distribution_sequence
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostingKind {
    Original,
    Reversal { of: i64, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountDefect {
    #[error("{field} has more than two fractional digits: {value}")]
    TooPrecise { field: &'static str, value: Decimal },
    #[error("{field} exceeds DECIMAL(9,2): {value}")]
    OutOfRange { field: &'static str, value: Decimal },
}

/// The business content of a posting, everything the caller supplies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingEntry {
    pub ssn: Ssn,
    pub profit_year: ProfitYear,
    #[serde(default)]
    pub profit_year_iteration: u8,
    pub profit_code: ProfitCode,
    pub distribution_sequence: i32,
    #[serde(default)]
    pub contribution: Decimal,
    #[serde(default)]
    pub earnings: Decimal,
    #[serde(default)]
    pub forfeiture: Decimal,
    #[serde(default)]
    pub federal_taxes: Decimal,
    #[serde(default)]
    pub state_taxes: Decimal,
    #[serde(default)]
    pub month_to_date: u8,
    #[serde(default)]
    pub year_to_date: i16,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub zero_contribution_reason: Option<u8>,
    #[serde(default)]
    pub tax_code: Option<TaxCode>,
    #[serde(default)]
    pub years_of_service_credit: i8,
}

impl PostingEntry {
    /// Zero-amount entry for the given key; fill amounts with the builders.
    pub fn new(ssn: Ssn, profit_year: ProfitYear, profit_code: ProfitCode, distribution_sequence: i32) -> Self {
        Self {
            ssn,
            profit_year,
            profit_year_iteration: 0,
            profit_code,
            distribution_sequence,
            contribution: Decimal::ZERO,
            earnings: Decimal::ZERO,
            forfeiture: Decimal::ZERO,
            federal_taxes: Decimal::ZERO,
            state_taxes: Decimal::ZERO,
            month_to_date: 0,
            year_to_date: 0,
            remark: None,
            zero_contribution_reason: None,
            tax_code: None,
            years_of_service_credit: 0,
        }
    }

    pub fn with_contribution(mut self, amount: Decimal) -> Self {
        self.contribution = amount;
        self
    }

    pub fn with_earnings(mut self, amount: Decimal) -> Self {
        self.earnings = amount;
        self
    }

    pub fn with_forfeiture(mut self, amount: Decimal) -> Self {
        self.forfeiture = amount;
        self
    }

    pub fn with_taxes(mut self, federal: Decimal, state: Decimal) -> Self {
        self.federal_taxes = federal;
        self.state_taxes = state;
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn with_service_credit(mut self, years: i8) -> Self {
        self.years_of_service_credit = years;
        self
    }

    pub fn key(&self) -> PostingKey {
        PostingKey {
            ssn: self.ssn,
            profit_year: self.profit_year,
            profit_code: self.profit_code,
            distribution_sequence: self.distribution_sequence,
        }
    }

    /// Amounts must fit DECIMAL(9,2).
    pub fn validate_amounts(&self) -> Result<(), AmountDefect> {
        let fields = [
            ("contribution", self.contribution),
            ("earnings", self.earnings),
            ("forfeiture", self.forfeiture),
            ("federal_taxes", self.federal_taxes),
            ("state_taxes", self.state_taxes),
        ];
        for (field, value) in fields {
            if value.normalize().scale() > 2 {
                return Err(AmountDefect::TooPrecise { field, value });
            }
            if value.abs() > MAX_AMOUNT {
                return Err(AmountDefect::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// The compensating entry: every amount and the service credit negated,
    /// placed at `distribution_sequence` of the same (SSN, year, code).
    pub fn negated(&self, distribution_sequence: i32) -> Self {
        Self {
            distribution_sequence,
            contribution: -self.contribution,
            earnings: -self.earnings,
            forfeiture: -self.forfeiture,
            federal_taxes: -self.federal_taxes,
            state_taxes: -self.state_taxes,
            remark: Some(format!(
                "REV {:02}/{:02}",
                self.month_to_date,
                self.year_to_date.rem_euclid(100)
            )),
            years_of_service_credit: self.years_of_service_credit.saturating_neg(),
            ..self.clone()
        }
    }
}

/// A stored posting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitDetail {
    pub id: i64,
    pub entry: PostingEntry,
    pub kind: PostingKind,
    pub created_at: DateTime<Utc>,
    pub user_name: String,
}

impl ProfitDetail {
    pub fn key(&self) -> PostingKey {
        self.entry.key()
    }

    pub fn reversal_of(&self) -> Option<i64> {
        match self.kind {
            PostingKind::Reversal { of, .. } => Some(of),
            PostingKind::Original => None,
        }
    }
}

/// Column totals for one profit code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTotals {
    pub contribution: Decimal,
    pub earnings: Decimal,
    pub forfeiture: Decimal,
    pub federal_taxes: Decimal,
    pub state_taxes: Decimal,
}

impl CodeTotals {
    fn add(&mut self, entry: &PostingEntry) {
        self.contribution += entry.contribution;
        self.earnings += entry.earnings;
        self.forfeiture += entry.forfeiture;
        self.federal_taxes += entry.federal_taxes;
        self.state_taxes += entry.state_taxes;
    }
}

/// Totals of the effective postings, grouped by profit code.
///
/// Effective postings are originals that have not been reversed. A reversed
/// original and its reversal cancel and are both left out.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerBalance {
    pub by_code: BTreeMap<ProfitCode, CodeTotals>,
}

impl LedgerBalance {
    pub fn from_postings<'a>(postings: impl IntoIterator<Item = &'a ProfitDetail>) -> Self {
        let postings: Vec<&ProfitDetail> = postings.into_iter().collect();
        let reversed: std::collections::HashSet<i64> =
            postings.iter().filter_map(|p| p.reversal_of()).collect();

        let mut by_code: BTreeMap<ProfitCode, CodeTotals> = BTreeMap::new();
        for posting in postings {
            if posting.reversal_of().is_some() || reversed.contains(&posting.id) {
                continue;
            }
            by_code
                .entry(posting.entry.profit_code)
                .or_default()
                .add(&posting.entry);
        }
        Self { by_code }
    }

    pub fn totals(&self, code: ProfitCode) -> CodeTotals {
        self.by_code.get(&code).copied().unwrap_or_default()
    }

    /// Signed account balance.
    ///
    /// Code 9 pays out of the forfeiture column. Codes 1, 2, 3 and 5 invert
    /// the forfeiture column and add the rest. Every other code adds all
    /// three columns.
    pub fn total(&self) -> Decimal {
        self.by_code
            .iter()
            .map(|(code, t)| match code {
                ProfitCode::VestedPayment => -t.forfeiture,
                c if c.is_outgoing() => -t.forfeiture + t.contribution + t.earnings,
                _ => t.contribution + t.earnings + t.forfeiture,
            })
            .sum()
    }

    /// The 100% vested amount (ETVA).
    pub fn etva(&self) -> Decimal {
        self.totals(ProfitCode::QdroAllocation).contribution
            + self.totals(ProfitCode::VestedEarnings).earnings
            + self.totals(ProfitCode::VestedPayment).forfeiture
    }

    /// Forfeiture totals of the distributing codes (1, 2, 3, 5, 9).
    pub fn distributions(&self) -> Decimal {
        self.by_code
            .iter()
            .filter(|(code, _)| code.counts_as_distribution())
            .map(|(_, t)| t.forfeiture)
            .sum()
    }

    pub fn is_zero(&self) -> bool {
        self.total().is_zero()
    }
}
