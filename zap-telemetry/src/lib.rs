//! # zap-telemetry
//!
//! Form-encoded telemetry decoding for DeroZap bike tracking stations.
//!
//! Stations batch events locally and upload them as
//! `application/x-www-form-urlencoded` bodies with indexed fields
//! (`DateTime0`, `BatteryVoltage0`, `BikeDateTime0`, ...). This crate decodes
//! those bodies and condenses them into a [`ZapSummary`] with event times
//! rendered as civil time in the station's zone.
//!
//! Station firmware is not trusted to produce well-formed reports, so every
//! function here is total: malformed fields are skipped, never errors.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::collections::HashMap;

use chrono::TimeZone;
use chrono_tz::Tz;
use serde::Serialize;

/// Render format for event timestamps (`2023-11-14 15:13:20`).
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Ceiling on event slots scanned per report, whatever the claimed counts say.
pub const MAX_EVENTS_PER_REPORT: u32 = 10_000;

/// Decode a form-encoded body into a key/value map.
///
/// Percent-escapes and `+` are decoded. When a key repeats, the last value
/// wins; a bare key without `=` maps to an empty value.
pub fn decode_form(body: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(body.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Condensed view of one station report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZapSummary {
    /// Number of status events the station claims to have batched.
    pub status_event_count: u32,
    /// Number of bike events the station claims to have batched.
    pub bike_event_count: u32,
    /// Status event times in the station's zone, in slot order.
    pub event_times: Vec<String>,
    /// Bike event times in the station's zone, in slot order.
    pub bike_event_times: Vec<String>,
    /// Battery voltage readings from the status event slots.
    pub battery_voltages: Vec<f64>,
}

/// Summarize a raw station report body.
///
/// Reads `statusEventCount` and `bikeEventCount` (zero when absent or not an
/// integer), then walks the indexed slots: `DateTime<i>` and
/// `BatteryVoltage<i>` for status events, `BikeDateTime<i>` for bike events.
/// Timestamps are epoch seconds and are rendered in `tz`; slots with missing
/// or unparsable fields are skipped. Fields indexed at or beyond the claimed
/// count are ignored.
pub fn summarize(body: &str, tz: Tz) -> ZapSummary {
    let fields = decode_form(body);

    let mut summary = ZapSummary {
        status_event_count: count_field(&fields, "statusEventCount"),
        bike_event_count: count_field(&fields, "bikeEventCount"),
        ..ZapSummary::default()
    };

    for i in 0..summary.status_event_count.min(MAX_EVENTS_PER_REPORT) {
        if let Some(time) = field(&fields, "DateTime", i).and_then(|raw| format_epoch(raw, tz)) {
            summary.event_times.push(time);
        }
        if let Some(volts) = field(&fields, "BatteryVoltage", i).and_then(|raw| raw.parse().ok()) {
            summary.battery_voltages.push(volts);
        }
    }

    for i in 0..summary.bike_event_count.min(MAX_EVENTS_PER_REPORT) {
        if let Some(time) = field(&fields, "BikeDateTime", i).and_then(|raw| format_epoch(raw, tz)) {
            summary.bike_event_times.push(time);
        }
    }

    summary
}

fn count_field(fields: &HashMap<String, String>, name: &str) -> u32 {
    fields.get(name).and_then(|v| v.parse().ok()).unwrap_or(0)
}

fn field<'a>(fields: &'a HashMap<String, String>, prefix: &str, index: u32) -> Option<&'a str> {
    fields.get(&format!("{prefix}{index}")).map(String::as_str)
}

/// Render epoch seconds as civil time in `tz`.
///
/// Returns `None` when `raw` is not an integer or falls outside the range
/// chrono can represent.
pub fn format_epoch(raw: &str, tz: Tz) -> Option<String> {
    let secs: i64 = raw.parse().ok()?;
    let time = tz.timestamp_opt(secs, 0).single()?;
    Some(time.format(EVENT_TIME_FORMAT).to_string())
}
