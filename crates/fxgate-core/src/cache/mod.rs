//! In-memory caching of upstream rate payloads.
//!
//! Latest rates and rates for the current day expire quickly; rates for
//! settled past dates are kept much longer since they never change.

mod rates;

pub use rates::{RateKey, RatesCache};
