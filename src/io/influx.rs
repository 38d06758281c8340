//! InfluxDB v2 persistence.
//!
//! - latest persisted instant via a Flux query (`/api/v2/query`, CSV response)
//! - record writes in line protocol (`/api/v2/write`, second precision)

use chrono::{DateTime, Utc};
use csv::StringRecord;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::domain::NormalizedRecord;
use crate::error::AppError;
use crate::traits::RecordStore;

pub const MEASUREMENT: &str = "electricity_consumption";
const TAG_METERING_POINT: &str = "metering_point";
const LATEST_LOOKBACK: &str = "-365d";
const WRITE_BATCH: usize = 5000;

pub struct InfluxStore {
    client: Client,
    url: String,
    token: String,
    org: String,
    bucket: String,
    metering_point: String,
}

impl InfluxStore {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
        metering_point: impl Into<String>,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .build()
            .map_err(|e| AppError::upstream(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            org: org.into(),
            bucket: bucket.into(),
            metering_point: metering_point.into(),
        })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, AppError> {
        Self::new(
            &config.influxdb_url,
            &config.influxdb_token,
            &config.influxdb_org,
            &config.influxdb_bucket,
            &config.metering_point,
        )
    }

    fn latest_query(&self) -> String {
        format!(
            "from(bucket: \"{bucket}\")\n  \
             |> range(start: {LATEST_LOOKBACK})\n  \
             |> filter(fn: (r) => r._measurement == \"{MEASUREMENT}\")\n  \
             |> filter(fn: (r) => r.{TAG_METERING_POINT} == \"{mp}\")\n  \
             |> filter(fn: (r) => r._field == \"consumption_kwh\")\n  \
             |> last()",
            bucket = flux_string(&self.bucket),
            mp = flux_string(&self.metering_point),
        )
    }

    fn post_lines(&self, body: String) -> Result<(), AppError> {
        let resp = self
            .client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "s"),
            ])
            .header("Authorization", format!("Token {}", self.token))
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()
            .map_err(|e| AppError::upstream(format!("InfluxDB write failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AppError::upstream(format!(
                "InfluxDB write failed with status {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }
}

impl RecordStore for InfluxStore {
    fn latest_instant(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        let resp = self
            .client
            .post(format!("{}/api/v2/query", self.url))
            .query(&[("org", self.org.as_str())])
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/csv")
            .json(&json!({
                "query": self.latest_query(),
                "type": "flux",
                "dialect": { "header": true, "annotations": [] },
            }))
            .send()
            .map_err(|e| AppError::upstream(format!("InfluxDB query failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| AppError::upstream(format!("Failed to read InfluxDB response: {e}")))?;
        if !status.is_success() {
            return Err(AppError::upstream(format!(
                "InfluxDB query failed with status {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_latest_time(&body)
    }

    fn write(&self, records: &[NormalizedRecord]) -> Result<usize, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        for chunk in records.chunks(WRITE_BATCH) {
            let body = chunk
                .iter()
                .map(|r| format_line(&self.metering_point, r))
                .collect::<Vec<_>>()
                .join("\n");
            debug!("Writing batch of {} points", chunk.len());
            self.post_lines(body)?;
        }

        info!("Wrote {} points to InfluxDB", records.len());
        Ok(records.len())
    }
}

/// Latest `_time` in a Flux CSV response, or `None` when it has no rows.
///
/// Responses may hold several tables, each with its own header row.
pub fn parse_latest_time(body: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut time_col: Option<usize> = None;
    let mut latest: Option<DateTime<Utc>> = None;

    for record in reader.records() {
        let record = record.map_err(|e| AppError::upstream(format!("Invalid InfluxDB CSV: {e}")))?;
        if let Some(idx) = header_index(&record) {
            time_col = Some(idx);
            continue;
        }

        let Some(raw) = time_col.and_then(|i| record.get(i)).filter(|s| !s.is_empty()) else {
            continue;
        };
        let t = DateTime::parse_from_rfc3339(raw)
            .map_err(|e| AppError::upstream(format!("Invalid InfluxDB time '{raw}': {e}")))?
            .with_timezone(&Utc);
        latest = Some(latest.map_or(t, |cur| cur.max(t)));
    }

    Ok(latest)
}

fn header_index(record: &StringRecord) -> Option<usize> {
    record.iter().position(|f| f == "_time")
}

/// One line-protocol point, timestamped in seconds.
pub fn format_line(metering_point: &str, record: &NormalizedRecord) -> String {
    format!(
        "{MEASUREMENT},{TAG_METERING_POINT}={mp} consumption_kwh={kwh},consumption_wh={wh},resolution=\"{res}\" {ts}",
        mp = escape_tag(metering_point),
        kwh = record.value_kwh,
        wh = record.value_wh(),
        res = record.resolution.code(),
        ts = record.instant.timestamp(),
    )
}

fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn flux_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
