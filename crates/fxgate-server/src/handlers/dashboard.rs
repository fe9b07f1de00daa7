//! Analytics dashboard, as an HTML page and as JSON.

use super::error::ApiResult;
use crate::server::AppState;
use axum::extract::State;
use axum::response::Html;
use axum::Json;
use fxgate_core::DashboardReport;
use std::fmt::Write;
use std::sync::Arc;

pub async fn handle_dashboard_json(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<DashboardReport>> {
    Ok(Json(state.service.dashboard().await?))
}

pub async fn handle_dashboard_html(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let report = state.service.dashboard().await?;
    Ok(Html(render(&report)))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn opt(value: &Option<String>) -> String {
    escape(value.as_deref().unwrap_or("-"))
}

fn table(out: &mut String, title: &str, headers: &[&str], rows: Vec<Vec<String>>) {
    let _ = write!(out, "<h2>{}</h2>\n<table>\n<tr>", escape(title));
    for header in headers {
        let _ = write!(out, "<th>{}</th>", escape(header));
    }
    out.push_str("</tr>\n");
    if rows.is_empty() {
        let _ = writeln!(
            out,
            "<tr><td colspan=\"{}\">No data available</td></tr>",
            headers.len()
        );
    }
    for row in rows {
        out.push_str("<tr>");
        for cell in row {
            let _ = write!(out, "<td>{}</td>", cell);
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");
}

fn average(avg: Option<f64>) -> String {
    avg.map(|a| format!("{:.4}", a)).unwrap_or_else(|| "-".to_string())
}

/// Render the report. Every cell is escaped before it is written.
fn render(report: &DashboardReport) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>fxgate dashboard</title>\n\
         <style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;margin-bottom:2em}\
         td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}</style>\n\
         </head>\n<body>\n<h1>fxgate dashboard</h1>\n",
    );

    let _ = writeln!(
        out,
        "<p>Most frequent conversion: <b>{}</b></p>",
        escape(&report.most_frequent_conversion)
    );
    let _ = writeln!(
        out,
        "<p>Average response time: <b>{}</b></p>",
        escape(&report.average_response_time)
    );
    if let Some(upstream) = &report.upstream {
        let _ = writeln!(
            out,
            "<p>Upstream {}: circuit {} ({} ok / {} failed)</p>",
            escape(&upstream.domain),
            upstream.state,
            upstream.total_successes,
            upstream.total_failures
        );
    }

    table(
        &mut out,
        "Top devices",
        &["Device", "Requests"],
        report
            .top_devices
            .iter()
            .map(|d| vec![escape(&d.device_name), d.count.to_string()])
            .collect(),
    );

    table(
        &mut out,
        "Client requests",
        &["Id", "Time", "Endpoint", "Method", "Device", "OS", "IP", "From", "To", "Date", "To date"],
        report
            .client_requests
            .iter()
            .map(|row| {
                let r = &row.record;
                vec![
                    row.id.to_string(),
                    r.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    escape(&r.endpoint),
                    escape(&r.http_method),
                    escape(&r.device_name),
                    escape(&r.operating_system),
                    opt(&r.ip_address),
                    opt(&r.from_currency),
                    opt(&r.to_currency),
                    opt(&r.date),
                    opt(&r.to_date),
                ]
            })
            .collect(),
    );

    table(
        &mut out,
        "Upstream requests",
        &["Id", "Started", "Endpoint", "Method", "From", "To", "To date", "URL"],
        report
            .server_requests
            .iter()
            .map(|row| {
                let r = &row.record;
                vec![
                    row.id.to_string(),
                    r.started_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
                    escape(&r.endpoint),
                    escape(&r.http_method),
                    opt(&r.from_currency),
                    opt(&r.to_currency),
                    opt(&r.to_date),
                    escape(&r.upstream_url),
                ]
            })
            .collect(),
    );

    table(
        &mut out,
        "Upstream responses",
        &["Id", "Time (ms)", "Status", "Size", "Base", "Start", "End", "Values", "Average", "Currencies"],
        report
            .server_responses
            .iter()
            .map(|row| {
                let r = &row.record;
                vec![
                    row.id.to_string(),
                    r.response_time_ms.to_string(),
                    r.status_code.to_string(),
                    r.payload_size.to_string(),
                    escape(&r.base),
                    r.start_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    r.end_date.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                    r.summary.number_of_values.to_string(),
                    average(r.summary.average_rate),
                    escape(&r.summary.to_currencies.join(", ")),
                ]
            })
            .collect(),
    );

    table(
        &mut out,
        "Gateway responses",
        &["Id", "Time (ms)", "Status", "Kind", "Values", "Average", "Currencies"],
        report
            .service_responses
            .iter()
            .map(|row| {
                let r = &row.record;
                vec![
                    row.id.to_string(),
                    r.response_time_ms.to_string(),
                    r.status_code.to_string(),
                    r.request_kind.to_string(),
                    r.summary.number_of_values.to_string(),
                    average(r.summary.average_rate),
                    escape(&r.summary.to_currencies.join(", ")),
                ]
            })
            .collect(),
    );

    out.push_str("</body>\n</html>\n");
    out
}
