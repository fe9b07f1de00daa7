//! Request analytics: records, SQLite persistence and the dashboard view.

mod dashboard;
mod recorder;
mod records;
mod store;
pub mod useragent;

pub use dashboard::{format_response_time, DashboardReport};
pub use recorder::AnalyticsRecorder;
pub use records::{
    ClientRequestRecord, DeviceCount, PairCount, RequestKind, ResponseSummary,
    ServerRequestRecord, ServerResponseRecord, ServiceResponseRecord, Stored,
};
pub use store::{AnalyticsStore, TableCounts};
pub use useragent::{classify, DeviceInfo};
