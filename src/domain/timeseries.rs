//! Time-series queries and the time-indexed table they produce

use std::collections::BTreeMap;
use std::io;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Name of the index column
pub const INDEX_NAME: &str = "Time";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parameters shared by historic and futuristic queries
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Channel addresses such as `meter0/ActivePower`
    pub channels: Vec<String>,
    /// Resolution in seconds; `None` or zero leaves it to the backend
    pub resolution_sec: Option<u64>,
}

impl TimeseriesQuery {
    pub fn new(start: NaiveDate, end: NaiveDate, channels: Vec<String>) -> Self {
        Self {
            start,
            end,
            channels,
            resolution_sec: None,
        }
    }

    pub fn with_resolution(mut self, seconds: u64) -> Self {
        self.resolution_sec = Some(seconds);
        self
    }

    /// Request parameters for the given timezone
    pub fn to_params(&self, timezone: &str) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("timezone".into(), json!(timezone));
        params.insert("fromDate".into(), json!(self.start.format(DATE_FORMAT).to_string()));
        params.insert("toDate".into(), json!(self.end.format(DATE_FORMAT).to_string()));
        params.insert("channels".into(), json!(self.channels));
        if let Some(seconds) = self.resolution_sec.filter(|s| *s > 0) {
            params.insert(
                "resolution".into(),
                json!({ "value": seconds, "unit": "SECONDS" }),
            );
        }
        params
    }
}

/// Table of channel values indexed by timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<FixedOffset>>,
    columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl TimeSeries {
    /// Reshape a `{ timestamps, data }` query result
    pub fn from_result(result: &Value) -> Result<Self> {
        let timestamps = result
            .get("timestamps")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Shape("missing timestamps".into()))?
            .iter()
            .map(|ts| {
                ts.as_str()
                    .ok_or_else(|| Error::Shape(format!("timestamp is not a string: {ts}")))
                    .and_then(parse_timestamp)
            })
            .collect::<Result<Vec<_>>>()?;

        let data = result
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Shape("missing data".into()))?;

        let mut columns = BTreeMap::new();
        for (channel, values) in data {
            let values = values
                .as_array()
                .ok_or_else(|| Error::Shape(format!("{channel}: values are not an array")))?;
            if values.len() != timestamps.len() {
                return Err(Error::Shape(format!(
                    "{channel}: {} values for {} timestamps",
                    values.len(),
                    timestamps.len()
                )));
            }
            columns.insert(channel.clone(), values.iter().map(cell_value).collect());
        }

        Ok(Self { timestamps, columns })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<FixedOffset>] {
        &self.timestamps
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, channel: &str) -> Option<&[Option<f64>]> {
        self.columns.get(channel).map(Vec::as_slice)
    }

    pub fn value(&self, channel: &str, row: usize) -> Option<f64> {
        self.column(channel)?.get(row).copied().flatten()
    }

    /// Write `Time,<channels...>` rows; returns the row count
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<usize> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec![INDEX_NAME.to_string()];
        header.extend(self.columns.keys().cloned());
        wtr.write_record(&header)?;

        for (row, ts) in self.timestamps.iter().enumerate() {
            let mut record = Vec::with_capacity(header.len());
            record.push(ts.to_rfc3339());
            for values in self.columns.values() {
                record.push(values[row].map(|v| v.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(self.timestamps.len())
    }
}

/// RFC 3339, optionally followed by a `[Region/City]` zone id, or naive UTC
fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = match raw.find('[') {
        Some(idx) if raw.ends_with(']') => &raw[..idx],
        _ => raw,
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts);
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|err| Error::Shape(format!("bad timestamp {raw:?}: {err}")))
}

fn cell_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
