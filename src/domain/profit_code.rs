//! Profit codes classify every ledger posting.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProfitCode {
    /// Incoming contributions, forfeitures and earnings.
    Incoming,
    /// Outgoing partial withdrawal.
    PartialWithdrawal,
    /// Outgoing forfeitures.
    OutgoingForfeiture,
    /// Outgoing direct payments or rollovers.
    DirectPayment,
    /// Outgoing transfer to a beneficiary or QDRO.
    TransferToBeneficiary,
    /// Incoming QDRO beneficiary allocation.
    QdroAllocation,
    /// Incoming earnings on the 100% vested amount.
    VestedEarnings,
    /// Outgoing payment from the 100% vested amount.
    VestedPayment,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profit code {0}")]
pub struct UnknownProfitCode(pub u8);

impl ProfitCode {
    pub const ALL: [ProfitCode; 8] = [
        Self::Incoming,
        Self::PartialWithdrawal,
        Self::OutgoingForfeiture,
        Self::DirectPayment,
        Self::TransferToBeneficiary,
        Self::QdroAllocation,
        Self::VestedEarnings,
        Self::VestedPayment,
    ];

    pub const fn id(self) -> u8 {
        match self {
            Self::Incoming => 0,
            Self::PartialWithdrawal => 1,
            Self::OutgoingForfeiture => 2,
            Self::DirectPayment => 3,
            Self::TransferToBeneficiary => 5,
            Self::QdroAllocation => 6,
            Self::VestedEarnings => 8,
            Self::VestedPayment => 9,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Incoming => "Incoming contributions, forfeitures, earnings",
            Self::PartialWithdrawal => "Outgoing payments (not rollovers or direct payments) - Partial withdrawal",
            Self::OutgoingForfeiture => "Outgoing forfeitures",
            Self::DirectPayment => "Outgoing direct payments / rollover payments",
            Self::TransferToBeneficiary => "Outgoing XFER beneficiary / QDRO allocation",
            Self::QdroAllocation => "Incoming QDRO beneficiary allocation",
            Self::VestedEarnings => "Incoming \"100% vested\" earnings",
            Self::VestedPayment => "Outgoing payment from 100% vesting amount (payment of ETVA funds)",
        }
    }

    /// Codes 1, 2, 3 and 5 carry their amount in the forfeiture column as
    /// money leaving the participant's account.
    pub const fn is_outgoing(self) -> bool {
        matches!(
            self,
            Self::PartialWithdrawal
                | Self::OutgoingForfeiture
                | Self::DirectPayment
                | Self::TransferToBeneficiary
        )
    }

    /// Codes whose forfeiture column counts toward total distributions.
    pub const fn counts_as_distribution(self) -> bool {
        self.is_outgoing() || matches!(self, Self::VestedPayment)
    }
}

impl TryFrom<u8> for ProfitCode {
    type Error = UnknownProfitCode;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|code| code.id() == id)
            .ok_or(UnknownProfitCode(id))
    }
}

impl From<ProfitCode> for u8 {
    fn from(code: ProfitCode) -> Self {
        code.id()
    }
}

impl std::fmt::Display for ProfitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}
