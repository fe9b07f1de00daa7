//! fxgate client - typed access to the gateway plus terminal charts.
//!
//! # Modules
//!
//! - `client` - [`GatewayClient`] for the gateway's REST API
//! - `chart` - line chart rendering for rate series

pub mod chart;
pub mod client;

pub use chart::render_line_chart;
pub use client::{GatewayClient, DEFAULT_GATEWAY_URL};
