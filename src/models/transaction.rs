//! Normalized ledger transactions as stored by the poller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Transfer direction relative to the watched address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Funds arriving at the watched address.
    Incoming,
    /// Funds leaving the watched address.
    Outgoing,
}

impl Direction {
    /// TEXT column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

/// An immutable, normalized record of one ledger-confirmed transfer.
///
/// The hash is the natural key; re-ingesting the same hash is a no-op
/// because ledger history pages can overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerTransaction {
    /// Ledger transaction hash; globally unique.
    pub hash: String,
    /// The watched address this record belongs to.
    pub wallet_address: String,
    /// Amount in major units.
    pub amount: Decimal,
    /// Currency code ("XRP" or an issued-currency code).
    pub currency: String,
    /// Direction relative to the watched address.
    pub direction: Direction,
    /// Counterparty destination address, when present.
    pub destination: Option<String>,
    /// Destination tag, the exchange sub-account discriminator.
    pub destination_tag: Option<u32>,
    /// Ledger sequence number the transaction was validated in.
    pub ledger_index: u64,
    /// Close time of the validating ledger.
    pub executed_at: DateTime<Utc>,
}

/// Aggregate activity for one wallet over a trailing window, used for the
/// trend enrichment on alert messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletActivity {
    /// Transactions observed in the window.
    pub transactions: u64,
    /// Total volume moved in the window, major units.
    pub volume: Decimal,
}
