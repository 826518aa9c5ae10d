//! Normalization of wire envelopes into stored transactions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::envelope::{AccountTxEnvelope, AmountField};
use crate::models::transaction::{Direction, LedgerTransaction};

/// Drops per unit of the native currency.
const DROPS_PER_UNIT: i64 = 1_000_000;

/// Offset between the ledger epoch (2000-01-01) and the Unix epoch.
const LEDGER_EPOCH_OFFSET: i64 = 946_684_800;

/// Native currency code used for drop-denominated amounts.
const NATIVE_CURRENCY: &str = "XRP";

/// Reasons an envelope cannot be turned into a stored transaction.
///
/// `NotAPayment` is an expected skip; the other variants are data errors
/// that the poller logs and skips without aborting the batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The entry is not a payment and carries no transfer to record.
    #[error("not a payment: {0}")]
    NotAPayment(String),

    /// The payment has no amount field.
    #[error("payment {0} has no amount")]
    MissingAmount(String),

    /// The amount could not be parsed as a decimal.
    #[error("unparseable amount on {0}: {1}")]
    BadAmount(String, String),

    /// The entry has no usable close time.
    #[error("payment {0} has no close time")]
    MissingTimestamp(String),

    /// The close time is outside the representable range.
    #[error("close time out of range on {0}")]
    BadTimestamp(String),

    /// The entry does not involve the watched address on either side.
    #[error("payment {0} does not involve the watched address")]
    Unrelated(String),
}

/// Converts one envelope into a `LedgerTransaction` for the given watched
/// address.
pub fn normalize(
    envelope: &AccountTxEnvelope,
    wallet_address: &str,
) -> Result<LedgerTransaction, NormalizeError> {
    let tx = &envelope.tx;

    if tx.transaction_type != "Payment" {
        return Err(NormalizeError::NotAPayment(tx.transaction_type.clone()));
    }

    let (amount, currency) = match &tx.amount {
        None => return Err(NormalizeError::MissingAmount(tx.hash.clone())),
        Some(AmountField::Drops(drops)) => {
            let drops: Decimal = drops
                .parse()
                .map_err(|e: rust_decimal::Error| {
                    NormalizeError::BadAmount(tx.hash.clone(), e.to_string())
                })?;
            (drops / Decimal::from(DROPS_PER_UNIT), NATIVE_CURRENCY.to_string())
        }
        Some(AmountField::Issued { currency, value, .. }) => {
            let value: Decimal = value
                .parse()
                .map_err(|e: rust_decimal::Error| {
                    NormalizeError::BadAmount(tx.hash.clone(), e.to_string())
                })?;
            (value, currency.clone())
        }
    };

    let direction = if tx.account == wallet_address {
        Direction::Outgoing
    } else if tx.destination.as_deref() == Some(wallet_address) {
        Direction::Incoming
    } else {
        return Err(NormalizeError::Unrelated(tx.hash.clone()));
    };

    let close_secs = tx
        .date
        .ok_or_else(|| NormalizeError::MissingTimestamp(tx.hash.clone()))?;
    let executed_at: DateTime<Utc> =
        DateTime::from_timestamp(close_secs + LEDGER_EPOCH_OFFSET, 0)
            .ok_or_else(|| NormalizeError::BadTimestamp(tx.hash.clone()))?;

    Ok(LedgerTransaction {
        hash: tx.hash.clone(),
        wallet_address: wallet_address.to_string(),
        amount,
        currency,
        direction,
        destination: tx.destination.clone(),
        destination_tag: tx.destination_tag,
        ledger_index: tx.ledger_index,
        executed_at,
    })
}
