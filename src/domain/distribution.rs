//! Distribution requests and the distributions paid from them.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ssn::Ssn;
use super::tax_code::TaxCode;

/// Memo stamped on over-64 normal distributions that pay less than vested.
pub const AGE_OVERRIDE_MEMO: &str = "AGE>64 - OVERRIDE";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionRequestType {
    Hardship,
    Yearly,
    OneTime,
    Payout,
    Rollover,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionRequestReason {
    Car,
    Education,
    EvictionOrForeclosure,
    Funeral,
    HomePurchase,
    HomeRepair,
    MedicalDental,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionRequestStatus {
    New,
    ReadyForReview,
    InCommitteeReview,
    Approved,
    Declined,
    Processed,
}

impl DistributionRequestStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::ReadyForReview => "ready_for_review",
            Self::InCommitteeReview => "in_committee_review",
            Self::Approved => "approved",
            Self::Declined => "declined",
            Self::Processed => "processed",
        }
    }

    /// Review moves one stage at a time; committee review decides.
    pub const fn can_move_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::ReadyForReview)
                | (Self::ReadyForReview, Self::InCommitteeReview)
                | (Self::InCommitteeReview, Self::Approved)
                | (Self::InCommitteeReview, Self::Declined)
                | (Self::Approved, Self::Processed)
        )
    }
}

impl std::fmt::Display for DistributionRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPayee {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionRequest {
    pub id: i64,
    pub ssn: Ssn,
    pub request_type: DistributionRequestType,
    pub reason: DistributionRequestReason,
    pub status: DistributionRequestStatus,
    pub amount_requested: Decimal,
    pub amount_authorized: Option<Decimal>,
    pub tax_code: TaxCode,
    pub payee: Option<DistributionPayee>,
    pub date_requested: NaiveDate,
    pub date_decided: Option<NaiveDate>,
}

/// Payment frequency; the variant letter is the stored id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionFrequency {
    #[serde(rename = "A")]
    Annually,
    #[serde(rename = "H")]
    Hardship,
    #[serde(rename = "M")]
    Monthly,
    #[serde(rename = "P")]
    PayDirect,
    #[serde(rename = "Q")]
    Quarterly,
    #[serde(rename = "R")]
    RolloverDirect,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionStatus {
    #[serde(rename = "C")]
    ManualCheck,
    #[serde(rename = "D")]
    PurgeRecord,
    #[serde(rename = "H")]
    OnHold,
    #[serde(rename = "O")]
    OverrideVestedAmount,
    #[serde(rename = "P")]
    PaymentMade,
    #[serde(rename = "X")]
    PurgeAllForSsn,
    #[serde(rename = "Y")]
    OkToPay,
    #[serde(rename = "Z")]
    PurgeAllForSsnAlt,
}

impl DistributionStatus {
    pub const fn id(self) -> char {
        match self {
            Self::ManualCheck => 'C',
            Self::PurgeRecord => 'D',
            Self::OnHold => 'H',
            Self::OverrideVestedAmount => 'O',
            Self::PaymentMade => 'P',
            Self::PurgeAllForSsn => 'X',
            Self::OkToPay => 'Y',
            Self::PurgeAllForSsnAlt => 'Z',
        }
    }

    pub const fn is_purged(self) -> bool {
        matches!(self, Self::PurgeRecord | Self::PurgeAllForSsn | Self::PurgeAllForSsnAlt)
    }
}

/// Input for a new distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDistribution {
    pub ssn: Ssn,
    pub demographic_id: i32,
    pub employee_name: String,
    pub participant_age: u32,
    pub frequency: DistributionFrequency,
    pub status: DistributionStatus,
    #[serde(default)]
    pub payee: Option<DistributionPayee>,
    pub gross_amount: Decimal,
    #[serde(default)]
    pub federal_tax_amount: Decimal,
    #[serde(default)]
    pub state_tax_amount: Decimal,
    pub tax_code: TaxCode,
    #[serde(default)]
    pub is_deceased: bool,
    #[serde(default)]
    pub is_qdro: bool,
    #[serde(default)]
    pub is_roth_ira: bool,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub ssn: Ssn,
    pub payment_sequence: i32,
    pub demographic_id: i32,
    pub employee_name: String,
    pub frequency: DistributionFrequency,
    pub status: DistributionStatus,
    pub payee: Option<DistributionPayee>,
    pub gross_amount: Decimal,
    pub federal_tax_amount: Decimal,
    pub state_tax_amount: Decimal,
    pub tax_code: TaxCode,
    pub is_deceased: bool,
    pub is_qdro: bool,
    pub is_roth_ira: bool,
    pub memo: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Distribution {
    /// Amount the check is written for.
    pub fn net_amount(&self) -> Decimal {
        self.gross_amount - self.federal_tax_amount - self.state_tax_amount
    }

    /// Name printed on the check.
    pub fn payable_name(&self) -> &str {
        self.payee
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or(self.employee_name.as_str())
    }
}
