//! Outbound notification channel table.
//!
//! The channel table is an explicitly injected configuration value: the
//! dispatcher and the health aggregator receive a `ChannelsConfig` at
//! construction, and routing resolves against it. There is no module-level
//! channel map anywhere in the crate.

use serde::Deserialize;
use url::Url;

/// One outbound notification channel: a send endpoint plus the opaque
/// target identifier the channel service routes on.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Endpoint the `{target_id, text, format}` payload is POSTed to.
    pub url: Url,
    /// Opaque channel identifier (chat group, room, feed).
    pub target_id: String,
}

/// Destination of a routed alert. Routing is a pure function of the alert;
/// this enum is the closed set of places an alert can land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRoute {
    /// Critical-severity alerts.
    Critical,
    /// Large deposits into known exchange accounts.
    ExchangeDeposits,
    /// Everything else that crossed a wallet threshold.
    WhaleMovements,
    /// System/fallback channel: escalations and operational notices.
    System,
}

/// The full channel table, one entry per route.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChannelsConfig {
    /// Channel for critical alerts.
    pub critical: ChannelConfig,
    /// Channel for exchange-deposit alerts.
    pub exchange_deposits: ChannelConfig,
    /// Channel for ordinary whale movements.
    pub whale_movements: ChannelConfig,
    /// System/fallback channel.
    pub system: ChannelConfig,
}

impl ChannelsConfig {
    /// Resolves a route to its configured channel.
    pub fn resolve(&self, route: ChannelRoute) -> &ChannelConfig {
        match route {
            ChannelRoute::Critical => &self.critical,
            ChannelRoute::ExchangeDeposits => &self.exchange_deposits,
            ChannelRoute::WhaleMovements => &self.whale_movements,
            ChannelRoute::System => &self.system,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ChannelsConfig {
        serde_json::from_str(
            r#"{
                "critical": {"url": "https://notify.example.com/send", "target_id": "crit"},
                "exchange_deposits": {"url": "https://notify.example.com/send", "target_id": "exch"},
                "whale_movements": {"url": "https://notify.example.com/send", "target_id": "whale"},
                "system": {"url": "https://notify.example.com/send", "target_id": "sys"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_maps_every_route() {
        let channels = table();
        assert_eq!(channels.resolve(ChannelRoute::Critical).target_id, "crit");
        assert_eq!(
            channels.resolve(ChannelRoute::ExchangeDeposits).target_id,
            "exch"
        );
        assert_eq!(
            channels.resolve(ChannelRoute::WhaleMovements).target_id,
            "whale"
        );
        assert_eq!(channels.resolve(ChannelRoute::System).target_id, "sys");
    }
}
