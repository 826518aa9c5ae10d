//! Channel routing for whale alerts.
//!
//! Routing is a pure function of the alert's severity, category, and
//! amount; there is no stateful load balancing.

use rust_decimal::Decimal;

use crate::{
    config::ChannelRoute,
    models::alert::{AlertCategory, AlertSeverity, WhaleAlert},
};

/// Routes an alert to its channel.
///
/// Critical alerts always win; exchange deposits go to the deposits channel
/// only above the configured floor; everything else is a general whale
/// movement.
pub fn route(alert: &WhaleAlert, exchange_deposit_floor: Decimal) -> ChannelRoute {
    if alert.severity == AlertSeverity::Critical {
        return ChannelRoute::Critical;
    }
    match alert.category {
        AlertCategory::ExchangeDeposit if alert.amount >= exchange_deposit_floor => {
            ChannelRoute::ExchangeDeposits
        }
        AlertCategory::ExchangeDeposit | AlertCategory::WhaleMovement => {
            ChannelRoute::WhaleMovements
        }
    }
}
