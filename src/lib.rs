#![warn(missing_docs)]
//! Spyhop is a ledger-watch and whale-alert dispatch pipeline: it polls a
//! distributed ledger for transactions against watched addresses, persists
//! them exactly once, classifies large movements against per-wallet
//! thresholds, and delivers alerts with retry and channel failover while
//! monitoring the health of its own stages.

pub mod alerting;
pub mod config;
pub mod health;
pub mod http_client;
pub mod http_server;
pub mod ledger;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod pipeline;
pub mod poller;
