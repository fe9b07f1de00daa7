//! SQLite analytics store.
//!
//! One database file holds every table. The connection sits behind a mutex
//! and callers on the async side reach it through `spawn_blocking`.

use super::records::{
    ClientRequestRecord, DeviceCount, PairCount, RequestKind, ResponseSummary,
    ServerRequestRecord, ServerResponseRecord, ServiceResponseRecord, Stored,
};
use crate::config::AnalyticsConfig;
use crate::error::{FxError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS client_request (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        endpoint TEXT NOT NULL,
        http_method TEXT NOT NULL,
        device_name TEXT NOT NULL,
        operating_system TEXT NOT NULL,
        ip_address TEXT,
        from_currency TEXT,
        to_currency TEXT,
        date TEXT,
        to_date TEXT,
        recorded_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_client_request_device
        ON client_request(device_name);

    CREATE TABLE IF NOT EXISTS conversion_pair (
        from_currency TEXT NOT NULL,
        to_currency TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (from_currency, to_currency)
    );

    CREATE TABLE IF NOT EXISTS server_request (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        started_at TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        http_method TEXT NOT NULL,
        to_date TEXT,
        from_currency TEXT,
        to_currency TEXT,
        upstream_url TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS server_response (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        response_time_ms INTEGER NOT NULL,
        status_code INTEGER NOT NULL,
        payload_size INTEGER NOT NULL,
        base TEXT NOT NULL,
        start_date TEXT,
        end_date TEXT,
        number_of_values INTEGER NOT NULL,
        average_rate REAL,
        to_currencies TEXT NOT NULL,
        rate_values TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS service_response (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        response_time_ms INTEGER NOT NULL,
        status_code INTEGER NOT NULL,
        request_kind TEXT NOT NULL,
        number_of_values INTEGER NOT NULL,
        average_rate REAL,
        to_currencies TEXT NOT NULL,
        rate_values TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    );
"#;

/// Persistent store for request analytics.
#[derive(Clone)]
pub struct AnalyticsStore {
    conn: Arc<Mutex<Connection>>,
}

impl AnalyticsStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| FxError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| FxError::Database {
            message: format!("Failed to open analytics database: {}", e),
            source: Some(e),
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| FxError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        debug!("Opened analytics database at {}", db_path.display());
        Self::from_connection(conn)
    }

    /// In-memory store, gone when the last handle drops.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| FxError::Database {
            message: format!("Failed to open in-memory database: {}", e),
            source: Some(e),
        })?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.busy_timeout(AnalyticsConfig::BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA).map_err(|e| FxError::Database {
            message: format!("Failed to initialize analytics schema: {}", e),
            source: Some(e),
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| FxError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    /// Store a client request and bump its conversion pair counter.
    pub fn insert_client_request(&self, record: &ClientRequestRecord) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO client_request
                (endpoint, http_method, device_name, operating_system, ip_address,
                 from_currency, to_currency, date, to_date, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.endpoint,
                record.http_method,
                record.device_name,
                record.operating_system,
                record.ip_address,
                record.from_currency,
                record.to_currency,
                record.date,
                record.to_date,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();

        if let Some((from, to)) = record.pair() {
            tx.execute(
                "INSERT INTO conversion_pair (from_currency, to_currency, count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(from_currency, to_currency) DO UPDATE SET count = count + 1",
                params![from, to],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    pub fn insert_server_request(&self, record: &ServerRequestRecord) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO server_request
                (started_at, endpoint, http_method, to_date, from_currency, to_currency, upstream_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.started_at.to_rfc3339(),
                record.endpoint,
                record.http_method,
                record.to_date,
                record.from_currency,
                record.to_currency,
                record.upstream_url,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_server_response(&self, record: &ServerResponseRecord) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO server_response
                (response_time_ms, status_code, payload_size, base, start_date, end_date,
                 number_of_values, average_rate, to_currencies, rate_values, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.response_time_ms as i64,
                record.status_code,
                record.payload_size as i64,
                record.base,
                record.start_date.map(|d| d.to_string()),
                record.end_date.map(|d| d.to_string()),
                record.summary.number_of_values as i64,
                record.summary.average_rate,
                serde_json::to_string(&record.summary.to_currencies)?,
                serde_json::to_string(&record.summary.values)?,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_service_response(&self, record: &ServiceResponseRecord) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO service_response
                (response_time_ms, status_code, request_kind, number_of_values,
                 average_rate, to_currencies, rate_values, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.response_time_ms as i64,
                record.status_code,
                record.request_kind.as_str(),
                record.summary.number_of_values as i64,
                record.summary.average_rate,
                serde_json::to_string(&record.summary.to_currencies)?,
                serde_json::to_string(&record.summary.values)?,
                record.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most frequent device names, highest count first, ties by name.
    pub fn top_devices(&self, limit: usize) -> Result<Vec<DeviceCount>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT device_name, COUNT(*) AS hits FROM client_request
             GROUP BY device_name
             ORDER BY hits DESC, device_name ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(DeviceCount {
                device_name: row.get(0)?,
                count: row.get::<_, i64>(1)? as u64,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Most requested conversion direction, ties by `(from, to)`.
    pub fn most_frequent_pair(&self) -> Result<Option<PairCount>> {
        let conn = self.lock()?;
        let pair = conn
            .query_row(
                "SELECT from_currency, to_currency, count FROM conversion_pair
                 ORDER BY count DESC, from_currency ASC, to_currency ASC
                 LIMIT 1",
                [],
                |row| {
                    Ok(PairCount {
                        from_currency: row.get(0)?,
                        to_currency: row.get(1)?,
                        count: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(pair)
    }

    /// Mean handling time of the gateway's own responses.
    pub fn average_response_time_ms(&self) -> Result<Option<f64>> {
        let conn = self.lock()?;
        let avg: Option<f64> = conn.query_row(
            "SELECT AVG(response_time_ms) FROM service_response",
            [],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    pub fn recent_client_requests(&self, limit: usize) -> Result<Vec<Stored<ClientRequestRecord>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, endpoint, http_method, device_name, operating_system, ip_address,
                    from_currency, to_currency, date, to_date, recorded_at
             FROM client_request ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Stored {
                id: row.get(0)?,
                record: ClientRequestRecord {
                    endpoint: row.get(1)?,
                    http_method: row.get(2)?,
                    device_name: row.get(3)?,
                    operating_system: row.get(4)?,
                    ip_address: row.get(5)?,
                    from_currency: row.get(6)?,
                    to_currency: row.get(7)?,
                    date: row.get(8)?,
                    to_date: row.get(9)?,
                    recorded_at: timestamp(row, 10)?,
                },
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn recent_server_requests(&self, limit: usize) -> Result<Vec<Stored<ServerRequestRecord>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, endpoint, http_method, to_date, from_currency,
                    to_currency, upstream_url
             FROM server_request ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Stored {
                id: row.get(0)?,
                record: ServerRequestRecord {
                    started_at: timestamp(row, 1)?,
                    endpoint: row.get(2)?,
                    http_method: row.get(3)?,
                    to_date: row.get(4)?,
                    from_currency: row.get(5)?,
                    to_currency: row.get(6)?,
                    upstream_url: row.get(7)?,
                },
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn recent_server_responses(
        &self,
        limit: usize,
    ) -> Result<Vec<Stored<ServerResponseRecord>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, response_time_ms, status_code, payload_size, base, start_date, end_date,
                    number_of_values, average_rate, to_currencies, rate_values, recorded_at
             FROM server_response ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(Stored {
                id: row.get(0)?,
                record: ServerResponseRecord {
                    response_time_ms: row.get::<_, i64>(1)? as u64,
                    status_code: row.get(2)?,
                    payload_size: row.get::<_, i64>(3)? as usize,
                    base: row.get(4)?,
                    start_date: date(row, 5)?,
                    end_date: date(row, 6)?,
                    summary: summary(row, 7)?,
                    recorded_at: timestamp(row, 11)?,
                },
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn recent_service_responses(
        &self,
        limit: usize,
    ) -> Result<Vec<Stored<ServiceResponseRecord>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, response_time_ms, status_code, request_kind, number_of_values,
                    average_rate, to_currencies, rate_values, recorded_at
             FROM service_response ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let kind: String = row.get(3)?;
            let request_kind = RequestKind::parse(&kind).ok_or_else(|| {
                conversion_error(3, format!("unknown request kind: {}", kind))
            })?;
            Ok(Stored {
                id: row.get(0)?,
                record: ServiceResponseRecord {
                    response_time_ms: row.get::<_, i64>(1)? as u64,
                    status_code: row.get(2)?,
                    request_kind,
                    summary: summary(row, 4)?,
                    recorded_at: timestamp(row, 8)?,
                },
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Row counts per table, in schema order.
    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.lock()?;
        let count = |table: &str| -> Result<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(TableCounts {
            client_requests: count("client_request")?,
            conversion_pairs: count("conversion_pair")?,
            server_requests: count("server_request")?,
            server_responses: count("server_response")?,
            service_responses: count("service_response")?,
        })
    }
}

/// Number of rows in each analytics table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub client_requests: u64,
    pub conversion_pairs: u64,
    pub server_requests: u64,
    pub server_responses: u64,
    pub service_responses: u64,
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse::<NaiveDate>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Reads the four summary columns starting at `idx`.
fn summary(row: &Row<'_>, idx: usize) -> rusqlite::Result<ResponseSummary> {
    let currencies: String = row.get(idx + 2)?;
    let values: String = row.get(idx + 3)?;
    Ok(ResponseSummary {
        number_of_values: row.get::<_, i64>(idx)? as usize,
        average_rate: row.get(idx + 1)?,
        to_currencies: serde_json::from_str(&currencies).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx + 2, Type::Text, Box::new(e))
        })?,
        values: serde_json::from_str(&values).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx + 3, Type::Text, Box::new(e))
        })?,
    })
}
