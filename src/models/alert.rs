//! Whale alerts derived from threshold-crossing transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::SeverityBands;
use crate::models::transaction::LedgerTransaction;

/// What kind of movement an alert describes. Closed set so routing can
/// match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    /// A large transfer with no known exchange involvement.
    WhaleMovement,
    /// A tagged transfer into a known exchange deposit address.
    ExchangeDeposit,
}

impl AlertCategory {
    /// TEXT column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::WhaleMovement => "whale_movement",
            AlertCategory::ExchangeDeposit => "exchange_deposit",
        }
    }
}

impl std::str::FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whale_movement" => Ok(AlertCategory::WhaleMovement),
            "exchange_deposit" => Ok(AlertCategory::ExchangeDeposit),
            other => Err(format!("unknown alert category: {other}")),
        }
    }
}

/// Alert severity, banded by amount. Ordering follows escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Crossed the wallet threshold but below the high floor.
    Medium,
    /// At or above the high floor.
    High,
    /// At or above the critical floor.
    Critical,
}

impl AlertSeverity {
    /// Bands an amount against the configured floors.
    pub fn for_amount(amount: Decimal, bands: &SeverityBands) -> Self {
        if amount >= bands.critical_floor {
            AlertSeverity::Critical
        } else if amount >= bands.high_floor {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        }
    }

    /// TEXT column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::str::FromStr for AlertSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(AlertSeverity::Medium),
            "high" => Ok(AlertSeverity::High),
            "critical" => Ok(AlertSeverity::Critical),
            other => Err(format!("unknown alert severity: {other}")),
        }
    }
}

/// An alert derived from exactly one transaction whose amount met its
/// wallet's threshold.
///
/// At most one alert exists per transaction hash; the store enforces this
/// with a unique index, and classification treats the conflict as a normal
/// no-op. Only the dispatcher mutates an alert, and only to flip
/// `sent`/`sent_at`/`metadata` after a confirmed delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WhaleAlert {
    /// Row id, assigned by the store.
    pub id: i64,
    /// Owner label of the wallet that triggered the alert.
    pub owner: String,
    /// Transaction amount, major units.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Hash of the underlying transaction.
    pub transaction_hash: String,
    /// Movement category.
    pub category: AlertCategory,
    /// Amount-banded severity.
    pub severity: AlertSeverity,
    /// Whether a delivery has been confirmed.
    pub sent: bool,
    /// When delivery was confirmed.
    pub sent_at: Option<DateTime<Utc>>,
    /// Free-form delivery metadata: channel used, escalation flag, attempt
    /// count, trend snapshot.
    pub metadata: serde_json::Value,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

impl WhaleAlert {
    /// Builds an unsent alert from a transaction (without an id; the store
    /// assigns one on insert).
    pub fn from_transaction(
        tx: &LedgerTransaction,
        owner: &str,
        category: AlertCategory,
        severity: AlertSeverity,
    ) -> Self {
        Self {
            id: 0,
            owner: owner.to_string(),
            amount: tx.amount,
            currency: tx.currency.clone(),
            transaction_hash: tx.hash.clone(),
            category,
            severity,
            sent: false,
            sent_at: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }
}
