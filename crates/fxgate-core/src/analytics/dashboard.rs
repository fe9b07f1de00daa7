//! Aggregated view over the analytics store.

use super::records::{
    ClientRequestRecord, DeviceCount, PairCount, ServerRequestRecord, ServerResponseRecord,
    ServiceResponseRecord, Stored,
};
use super::store::{AnalyticsStore, TableCounts};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::network::CircuitBreakerStats;
use serde::Serialize;

/// Everything the dashboard page shows.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    /// `"X to Y"`, or the no-data marker.
    pub most_frequent_conversion: String,
    pub most_frequent_pair: Option<PairCount>,
    pub top_devices: Vec<DeviceCount>,
    /// `"12.34 ms"`, or the no-data marker.
    pub average_response_time: String,
    pub average_response_time_ms: Option<f64>,
    pub totals: TableCounts,
    pub client_requests: Vec<Stored<ClientRequestRecord>>,
    pub server_requests: Vec<Stored<ServerRequestRecord>>,
    pub server_responses: Vec<Stored<ServerResponseRecord>>,
    pub service_responses: Vec<Stored<ServiceResponseRecord>>,
    pub upstream: Option<CircuitBreakerStats>,
}

impl DashboardReport {
    /// Query the store. `recent` bounds each listing.
    pub fn load(
        store: &AnalyticsStore,
        recent: usize,
        upstream: Option<CircuitBreakerStats>,
    ) -> Result<Self> {
        let most_frequent_pair = store.most_frequent_pair()?;
        let average_response_time_ms = store.average_response_time_ms()?;

        Ok(Self {
            most_frequent_conversion: most_frequent_pair
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| DashboardConfig::NO_DATA.to_string()),
            most_frequent_pair,
            top_devices: store.top_devices(DashboardConfig::TOP_DEVICES)?,
            average_response_time: format_response_time(average_response_time_ms),
            average_response_time_ms,
            totals: store.table_counts()?,
            client_requests: store.recent_client_requests(recent)?,
            server_requests: store.recent_server_requests(recent)?,
            server_responses: store.recent_server_responses(recent)?,
            service_responses: store.recent_service_responses(recent)?,
            upstream,
        })
    }
}

pub fn format_response_time(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{:.2} ms", ms),
        None => DashboardConfig::NO_DATA.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::records::{RequestKind, ResponseSummary};
    use chrono::Utc;

    #[test]
    fn test_empty_report() {
        let store = AnalyticsStore::in_memory().unwrap();
        let report = DashboardReport::load(&store, 10, None).unwrap();
        assert_eq!(report.most_frequent_conversion, "No data available");
        assert_eq!(report.average_response_time, "No data available");
        assert!(report.top_devices.is_empty());
        assert!(report.client_requests.is_empty());
    }

    #[test]
    fn test_report_formats_values() {
        let store = AnalyticsStore::in_memory().unwrap();
        store
            .insert_client_request(&ClientRequestRecord {
                endpoint: "/api/convert".into(),
                http_method: "GET".into(),
                device_name: "Pixel 8".into(),
                operating_system: "Android 14".into(),
                ip_address: None,
                from_currency: Some("EUR".into()),
                to_currency: Some("JPY".into()),
                date: None,
                to_date: None,
                recorded_at: Utc::now(),
            })
            .unwrap();
        store
            .insert_service_response(&ServiceResponseRecord {
                response_time_ms: 3,
                status_code: 200,
                request_kind: RequestKind::Convert,
                summary: ResponseSummary::single_rate("JPY", 160.2),
                recorded_at: Utc::now(),
            })
            .unwrap();

        let report = DashboardReport::load(&store, 10, None).unwrap();
        assert_eq!(report.most_frequent_conversion, "EUR to JPY");
        assert_eq!(report.average_response_time, "3.00 ms");
        assert_eq!(report.top_devices[0].device_name, "Pixel 8");
        assert_eq!(report.totals.client_requests, 1);
    }

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(Some(12.345)), "12.35 ms");
        assert_eq!(format_response_time(None), "No data available");
    }
}
