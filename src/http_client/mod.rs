//! Shared HTTP client infrastructure: retryable client construction and a
//! policy-keyed client pool.

mod client;
mod pool;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};
