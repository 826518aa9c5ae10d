//! Configuration module for Spyhop.

mod app_config;
mod channels;
mod dispatch_retry;
mod health;
mod helpers;
mod http_base;
mod http_retry;

pub use app_config::{AppConfig, ServerConfig, SeverityBands};
pub use channels::{ChannelConfig, ChannelRoute, ChannelsConfig};
pub use dispatch_retry::DispatchRetryConfig;
pub use health::HealthConfig;
pub use helpers::{
    deserialize_duration_from_ms, deserialize_duration_from_seconds, deserialize_urls,
};
pub use http_base::BaseHttpClientConfig;
pub use http_retry::{HttpRetryConfig, JitterSetting};
