//! WattiVahti metering API integration.

use std::cell::RefCell;

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::{RawSample, Resolution, SyncWindow};
use crate::error::AppError;
use crate::time::rule::DstRule;
use crate::traits::ConsumptionSource;

const USER_AGENT: &str = concat!("wattivahti-sync/", env!("CARGO_PKG_VERSION"));
/// `measurementType` for consumption (as opposed to production) data.
const MEASUREMENT_CONSUMPTION: &str = "1";

pub struct WattiVahtiClient {
    client: Client,
    api_base: String,
    metering_point: String,
    access_token: String,
    rule: DstRule,
    last_response: RefCell<Option<serde_json::Value>>,
}

impl WattiVahtiClient {
    pub fn new(
        api_base: impl Into<String>,
        metering_point: impl Into<String>,
        access_token: impl Into<String>,
        rule: DstRule,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::upstream(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            metering_point: metering_point.into(),
            access_token: access_token.into(),
            rule,
            last_response: RefCell::new(None),
        })
    }

    /// Raw JSON body of the most recent successful request.
    pub fn take_last_response(&self) -> Option<serde_json::Value> {
        self.last_response.borrow_mut().take()
    }

    /// Fetch the raw `meterdata2` response for `window`.
    pub fn fetch_raw(&self, window: &SyncWindow, resolution: Resolution) -> Result<serde_json::Value, AppError> {
        let start = self.local_bound(window.start)?;
        let stop = self.local_bound(window.end)?;
        info!("Fetching data from {start} to {stop} with resolution {resolution}");

        let resp = self
            .client
            .get(format!("{}/meterdata2", self.api_base))
            .header("Accept", "application/json")
            .bearer_auth(&self.access_token)
            .query(&[
                ("meteringPointCode", self.metering_point.as_str()),
                ("measurementType", MEASUREMENT_CONSUMPTION),
                ("start", start.as_str()),
                ("stop", stop.as_str()),
                ("resultStep", resolution.code()),
            ])
            .send()
            .map_err(|e| AppError::upstream(format!("WattiVahti request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(AppError::upstream(format!(
                "WattiVahti request failed with status {status}: {snippet}"
            )));
        }

        resp.json()
            .map_err(|e| AppError::upstream(format!("Failed to parse WattiVahti response: {e}")))
    }

    fn local_bound(&self, instant: DateTime<Utc>) -> Result<String, AppError> {
        self.rule
            .to_fixed(instant)
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| AppError::upstream(format!("Cannot express {instant} in local time.")))
    }
}

impl ConsumptionSource for WattiVahtiClient {
    fn fetch(&self, window: &SyncWindow, resolution: Resolution) -> Result<Vec<RawSample>, AppError> {
        let raw = self.fetch_raw(window, resolution)?;
        let body: MeterDataResponse = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::upstream(format!("Unexpected WattiVahti response shape: {e}")))?;
        *self.last_response.borrow_mut() = Some(raw);
        parse_samples(&body)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MeterDataResponse {
    #[serde(default)]
    getconsumptionsresult: ConsumptionsResult,
}

#[derive(Debug, Default, Deserialize)]
struct ConsumptionsResult {
    #[serde(default)]
    consumptiondata: ConsumptionData,
}

#[derive(Debug, Default, Deserialize)]
struct ConsumptionData {
    #[serde(default)]
    timeseries: TimeSeries,
}

#[derive(Debug, Default, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    values: TimeSeriesValues,
}

#[derive(Debug, Default, Deserialize)]
struct TimeSeriesValues {
    #[serde(default)]
    tsv: Vec<TsvItem>,
}

#[derive(Debug, Deserialize)]
struct TsvItem {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    quantity: Option<serde_json::Value>,
}

/// Extract samples in emission order.
///
/// Items without a timestamp or quantity are skipped; an unparsable
/// timestamp or quantity fails the whole response.
pub fn parse_samples(body: &MeterDataResponse) -> Result<Vec<RawSample>, AppError> {
    let items = &body.getconsumptionsresult.consumptiondata.timeseries.values.tsv;
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        let (Some(time), Some(quantity)) = (item.time.as_deref(), item.quantity.as_ref()) else {
            continue;
        };
        if time.is_empty() || quantity.is_null() {
            continue;
        }

        let local = parse_api_time(time)?;
        let value_kwh = parse_quantity(quantity)
            .ok_or_else(|| AppError::upstream(format!("Invalid quantity '{quantity}' at {time}.")))?;
        out.push(RawSample::new(local, value_kwh));
    }

    debug!("Parsed {} samples from response", out.len());
    Ok(out)
}

/// Parse an API timestamp as naive local wall-clock time.
///
/// The API marks its local timestamps with a trailing `Z` even though they
/// are not UTC; the suffix is ignored.
pub fn parse_api_time(raw: &str) -> Result<NaiveDateTime, AppError> {
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M"))
        .map_err(|e| AppError::upstream(format!("Invalid WattiVahti timestamp '{raw}': {e}")))
}

fn parse_quantity(value: &serde_json::Value) -> Option<f64> {
    let v = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
