//! Upstream networking: HTTP client, retries, circuit breaking and the
//! Frankfurter rates client.

mod circuit_breaker;
mod client;
mod frankfurter;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitPermit, CircuitState,
};
pub use client::{extract_domain, FetchedBody, HttpClient};
pub use frankfurter::{Exchange, FrankfurterClient, RatesProvider, UpstreamCall, UpstreamEndpoint};
pub use retry::{retry_async, RetryPolicy};
