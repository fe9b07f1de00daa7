//! fxgate core - exchange rates, conversion and request analytics.
//!
//! This crate holds everything the gateway needs without any HTTP server
//! layer: currency validation, the upstream rates client (retry, circuit
//! breaker, TTL cache), the SQLite analytics store and the [`RatesService`]
//! facade tying them together.
//!
//! # Example
//!
//! ```rust,ignore
//! use fxgate_core::{CurrencyPair, RatesService, ServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> fxgate_core::Result<()> {
//!     let config = ServiceConfig::builder().in_memory_database().build()?;
//!     let service = RatesService::new(&config)?;
//!
//!     let pair = CurrencyPair::parse("EUR", "USD")?;
//!     let conversion = service.convert(&pair, 100.0, None).await?;
//!     println!("Result: {}", conversion.display_result());
//!
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod cache;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod error;
pub mod models;
pub mod network;

mod service;

// Re-export commonly used types
pub use analytics::{AnalyticsStore, DashboardReport, RequestKind, ResponseSummary};
pub use cache::RatesCache;
pub use config::ServiceConfig;
pub use conversion::{Conversion, SeriesStats};
pub use currency::{CurrencyCode, CurrencyPair, DateRange};
pub use error::{FxError, Result};
pub use models::{HistoricalRate, LatestRate, RatePoint, RatesSnapshot, SeriesSnapshot};
pub use network::{FrankfurterClient, RatesProvider};
pub use service::RatesService;
