use chrono::NaiveDateTime;
use serde_json::{Map, Value};

use crate::error::SyncError;

/// Fields kept from the remote station listing before it is cached.
pub const STATION_FIELDS: [&str; 4] = ["id", "stationName", "gegrLat", "gegrLon"];

/// A fixed monitoring location.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A single measured parameter hosted at one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: i64,
    pub parameter_name: String,
    pub station_id: i64,
}

/// One fully populated measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: String,
    pub value: f64,
}

impl Sample {
    /// Parse the timestamp. The API uses `YYYY-MM-DD HH:MM:SS`, ISO `T` is accepted too.
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S"))
            .ok()
    }
}

/// Time series of valid samples for one sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSeries {
    pub key: String,
    pub parameter_code: Option<String>,
    pub samples: Vec<Sample>,
}

impl MeasurementSeries {
    /// Build a series from a raw or cached payload.
    ///
    /// Requires a `values` array; entries lacking a string `date` or a numeric
    /// `value` are dropped.
    pub fn from_payload(payload: &Value) -> Result<Self, SyncError> {
        let values = payload
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| SyncError::Validation("missing values array".to_string()))?;

        let key = payload
            .get("key")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let parameter_code = payload
            .get("param")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        let samples = values.iter().filter_map(valid_sample).collect();

        Ok(Self {
            key,
            parameter_code,
            samples,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples ordered by timestamp, ready for plotting.
    pub fn chart_points(&self) -> Vec<Sample> {
        let mut points = self.samples.clone();
        points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        points
    }

    /// Y-axis label: the parameter code, else the `(...)` part of the key, else "Value".
    pub fn axis_label(&self) -> String {
        if let Some(code) = &self.parameter_code {
            return code.clone();
        }
        self.key
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(inner, _)| inner)
            .filter(|inner| !inner.is_empty())
            .unwrap_or("Value")
            .to_string()
    }

    /// Oldest and newest parseable timestamps.
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let mut times = self.samples.iter().filter_map(Sample::datetime);
        let first = times.next()?;
        Some(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }
}

fn valid_sample(item: &Value) -> Option<Sample> {
    let timestamp = item.get("date")?.as_str()?;
    let value = item.get("value")?.as_f64()?;
    Some(Sample {
        timestamp: timestamp.to_string(),
        value,
    })
}

fn is_valid_item(item: &Value) -> bool {
    valid_sample(item).is_some()
}

/// A downloaded payload reduced to its valid entries, plus the cache file name
/// derived from them.
#[derive(Debug, Clone)]
pub struct FilteredPayload {
    pub file_name: String,
    pub document: Value,
    pub sample_count: usize,
}

/// Drop invalid entries from a raw `getData` payload.
///
/// The kept entries are stored verbatim so that re-filtering a cached file is
/// a no-op. The file name is `{last}_to_{first}.json` where first/last are the
/// first and last valid entries in payload order (the API lists newest first).
pub fn filter_measurements(payload: &Value) -> Result<FilteredPayload, SyncError> {
    let values = payload
        .get("values")
        .and_then(Value::as_array)
        .ok_or_else(|| SyncError::Validation("missing values array".to_string()))?;

    let kept: Vec<Value> = values.iter().filter(|v| is_valid_item(v)).cloned().collect();

    let (Some(first), Some(last)) = (kept.first(), kept.last()) else {
        return Err(SyncError::Validation(
            "there are no data points in the payload".to_string(),
        ));
    };
    let first_date = first["date"].as_str().unwrap_or_default();
    let last_date = last["date"].as_str().unwrap_or_default();
    let file_name = format!(
        "{}_to_{}.json",
        format_date_for_filename(last_date),
        format_date_for_filename(first_date)
    );

    let mut document = Map::new();
    if let Some(key) = payload.get("key") {
        document.insert("key".to_string(), key.clone());
    }
    let sample_count = kept.len();
    document.insert("values".to_string(), Value::Array(kept));

    Ok(FilteredPayload {
        file_name,
        document: Value::Object(document),
        sample_count,
    })
}

/// `2025-04-22 15:00:00` -> `2025-04-22_15`; anything shorter than 13 chars is `unknown`.
pub fn format_date_for_filename(date: &str) -> String {
    match (date.get(0..10), date.get(11..13)) {
        (Some(day), Some(hour)) => format!("{}_{}", day, hour),
        _ => "unknown".to_string(),
    }
}

/// Keep only the allowlisted station fields.
pub fn filter_station_fields(listing: &Value) -> Result<Value, SyncError> {
    let stations = listing
        .as_array()
        .ok_or_else(|| SyncError::Parse("station listing is not an array".to_string()))?;

    let filtered = stations
        .iter()
        .map(|station| {
            let mut kept = Map::new();
            for field in STATION_FIELDS {
                if let Some(v) = station.get(field) {
                    kept.insert(field.to_string(), v.clone());
                }
            }
            Value::Object(kept)
        })
        .collect();

    Ok(Value::Array(filtered))
}

/// Parse a station listing. Entries without `id` or `stationName` are skipped;
/// unparseable coordinates become (0, 0) and are logged.
pub fn parse_stations(listing: &Value) -> Result<Vec<Station>, SyncError> {
    let items = listing
        .as_array()
        .ok_or_else(|| SyncError::Parse("station listing is not an array".to_string()))?;

    let mut stations = Vec::with_capacity(items.len());
    for item in items {
        let (Some(id), Some(name)) = (
            item.get("id").and_then(Value::as_i64),
            item.get("stationName").and_then(Value::as_str),
        ) else {
            tracing::debug!("Skipping station entry without id or name: {}", item);
            continue;
        };

        let coords = (
            item.get("gegrLat").and_then(parse_coordinate),
            item.get("gegrLon").and_then(parse_coordinate),
        );
        let (latitude, longitude) = match coords {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                tracing::warn!(
                    "Failed to parse coordinates for station {} ({}), using (0, 0)",
                    name,
                    id
                );
                (0.0, 0.0)
            }
        };

        stations.push(Station {
            id,
            name: name.to_string(),
            latitude,
            longitude,
        });
    }
    Ok(stations)
}

/// Coordinates arrive as strings with a `.` decimal separator; plain numbers are accepted too.
fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Parse a per-station sensor listing.
pub fn parse_sensors(listing: &Value, station_id: i64) -> Result<Vec<Sensor>, SyncError> {
    let items = listing
        .as_array()
        .ok_or_else(|| SyncError::Parse("sensor listing is not an array".to_string()))?;

    Ok(items
        .iter()
        .filter_map(|item| {
            let id = item.get("id").and_then(Value::as_i64)?;
            let parameter_name = item
                .get("param")
                .and_then(|p| p.get("paramName"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string();
            Some(Sensor {
                id,
                parameter_name,
                station_id,
            })
        })
        .collect())
}
