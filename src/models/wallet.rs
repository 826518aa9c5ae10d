//! Watched wallet registry entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

fn default_active() -> bool {
    true
}

/// Operator-declared wallet entry, as it appears in configuration.
/// Synced into the store at startup without ever touching a stored cursor.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct WalletSpec {
    /// Ledger address to watch.
    pub address: String,
    /// Human-readable owner label used in alert messages.
    pub owner: String,
    /// Per-wallet alert threshold; `None` falls back to the configured
    /// default.
    #[serde(default)]
    pub threshold: Option<Decimal>,
    /// Whether the wallet is polled.
    #[serde(default = "default_active")]
    pub active: bool,
}

/// A monitored address with its polling cursor.
///
/// The cursor is the last processed ledger index. It only ever moves
/// forward; the repository enforces this with a conditional update, so a
/// stale or concurrent poll can never rewind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedWallet {
    /// Row id, assigned by the store.
    pub id: i64,
    /// Ledger address.
    pub address: String,
    /// Owner label.
    pub owner: String,
    /// Per-wallet alert threshold, if set.
    pub threshold: Option<Decimal>,
    /// Whether the wallet is polled.
    pub active: bool,
    /// Last processed ledger index; `None` until the first successful poll.
    pub cursor: Option<u64>,
    /// Timestamp when the wallet was first registered.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last registry or cursor update.
    pub updated_at: DateTime<Utc>,
}

impl WatchedWallet {
    /// Builds a wallet from a config spec (without an id; the store assigns
    /// one on insert).
    pub fn from_spec(spec: &WalletSpec) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            address: spec.address.clone(),
            owner: spec.owner.clone(),
            threshold: spec.threshold,
            active: spec.active,
            cursor: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The effective alert threshold for this wallet.
    pub fn threshold_or(&self, default: Decimal) -> Decimal {
        self.threshold.unwrap_or(default)
    }
}
