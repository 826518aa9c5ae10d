//! Alert message assembly.

use crate::models::{
    alert::{AlertCategory, AlertSeverity, WhaleAlert},
    transaction::{Direction, LedgerTransaction, WalletActivity},
};

/// Renders the outbound text for a whale alert.
///
/// The transaction adds direction and counterparty detail when available;
/// the trend snapshot is purely informational and simply omitted when it
/// could not be computed or covers fewer than two transactions.
pub fn render_alert(
    alert: &WhaleAlert,
    tx: Option<&LedgerTransaction>,
    trend: Option<&WalletActivity>,
) -> String {
    let headline = match (alert.category, alert.severity) {
        (AlertCategory::ExchangeDeposit, AlertSeverity::Critical) => {
            "🚨 Critical exchange deposit"
        }
        (AlertCategory::ExchangeDeposit, _) => "🏦 Exchange deposit",
        (AlertCategory::WhaleMovement, AlertSeverity::Critical) => "🚨 Critical whale movement",
        (AlertCategory::WhaleMovement, AlertSeverity::High) => "🐋 Large whale movement",
        (AlertCategory::WhaleMovement, AlertSeverity::Medium) => "🐋 Whale movement",
    };

    let mut lines = vec![
        format!("*{headline}*"),
        format!(
            "{}: {} {}",
            alert.owner,
            format_amount(alert),
            alert.currency
        ),
    ];

    if let Some(tx) = tx {
        match tx.direction {
            Direction::Outgoing => {
                if let Some(destination) = &tx.destination {
                    lines.push(format!("Sent to `{destination}`"));
                }
                if let Some(tag) = tx.destination_tag {
                    lines.push(format!("Destination tag: {tag}"));
                }
            }
            Direction::Incoming => {
                lines.push("Incoming transfer".to_string());
            }
        }
        lines.push(format!("Ledger: {}", tx.ledger_index));
    }

    lines.push(format!("Tx: `{}`", alert.transaction_hash));

    if let Some(trend) = trend {
        if trend.transactions > 1 {
            lines.push(format!(
                "Trend: {} transactions moving {} {} in the last hour",
                trend.transactions, trend.volume, alert.currency
            ));
        }
    }

    lines.join("\n")
}

/// Prefix applied to the escalation send when the primary channel failed.
pub fn escalation_prefix(primary_target: &str, attempts: u32) -> String {
    format!(
        "⚠️ Delivery via '{primary_target}' failed after {attempts} attempts; rerouted to system channel."
    )
}

fn format_amount(alert: &WhaleAlert) -> String {
    // Group the integer part with thousands separators for readability.
    let raw = alert.amount.to_string();
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };
    let mut grouped = String::new();
    let digits: Vec<char> = int_part.chars().collect();
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 && *c != '-' {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::{AlertCategory, AlertSeverity};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn alert() -> WhaleAlert {
        WhaleAlert {
            id: 1,
            owner: "Treasury".to_string(),
            amount: dec!(1250000),
            currency: "XRP".to_string(),
            transaction_hash: "ABC123".to_string(),
            category: AlertCategory::WhaleMovement,
            severity: AlertSeverity::Critical,
            sent: false,
            sent_at: None,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_render_includes_owner_amount_and_hash() {
        let text = render_alert(&alert(), None, None);
        assert!(text.contains("Treasury"));
        assert!(text.contains("1,250,000 XRP"));
        assert!(text.contains("ABC123"));
        assert!(text.contains("Critical"));
    }

    #[test]
    fn test_trend_omitted_for_single_transaction() {
        let trend = WalletActivity {
            transactions: 1,
            volume: dec!(1250000),
        };
        let text = render_alert(&alert(), None, Some(&trend));
        assert!(!text.contains("Trend:"));
    }

    #[test]
    fn test_trend_included_for_multiple_transactions() {
        let trend = WalletActivity {
            transactions: 4,
            volume: dec!(3000000),
        };
        let text = render_alert(&alert(), None, Some(&trend));
        assert!(text.contains("Trend: 4 transactions"));
    }

    #[test]
    fn test_escalation_prefix_names_failed_channel() {
        let prefix = escalation_prefix("whale-movements", 3);
        assert!(prefix.contains("whale-movements"));
        assert!(prefix.contains("3 attempts"));
    }

    #[test]
    fn test_amount_grouping() {
        let mut a = alert();
        a.amount = dec!(75000.5);
        let text = render_alert(&a, None, None);
        assert!(text.contains("75,000.5 XRP"));
    }
}
