//! Wire-level transaction envelopes as returned by the ledger's
//! `account_tx` API.

use serde::Deserialize;

/// An amount as it appears on the wire: either native-unit drops as a bare
/// string, or an issued-currency object.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AmountField {
    /// Native currency, expressed in drops.
    Drops(String),
    /// Issued currency with its code and issuing account.
    Issued {
        /// Currency code.
        currency: String,
        /// Decimal value as a string, already in major units.
        value: String,
        /// Issuing account.
        issuer: String,
    },
}

/// The transaction payload inside an envelope. Field names follow the wire
/// format's mixed casing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TxPayload {
    /// Transaction hash.
    pub hash: String,
    /// Wire transaction type, e.g. `Payment`.
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    /// Sending account.
    #[serde(rename = "Account")]
    pub account: String,
    /// Receiving account, when the type has one.
    #[serde(rename = "Destination")]
    pub destination: Option<String>,
    /// Destination tag, when present.
    #[serde(rename = "DestinationTag")]
    pub destination_tag: Option<u32>,
    /// Transferred amount, when the type has one.
    #[serde(rename = "Amount")]
    pub amount: Option<AmountField>,
    /// Ledger sequence number the transaction was validated in.
    pub ledger_index: u64,
    /// Close time in seconds since the ledger epoch.
    pub date: Option<i64>,
}

/// One entry of an `account_tx` response.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountTxEnvelope {
    /// The transaction payload.
    pub tx: TxPayload,
    /// Whether the entry is in a validated ledger.
    #[serde(default)]
    pub validated: bool,
}
