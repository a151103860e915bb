//! Input parsing and series cleaning.
//!
//! The entry document is `{daily: Bar[], intraday: Bar[], corp_actions:
//! object[]}`. Price series are cleaned leniently: rows with an
//! unparseable timestamp or a non-finite numeric field are dropped, the
//! remainder sorted and de-duplicated by timestamp. Missing arrays and
//! series that clean down to nothing are fatal.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::{Bar, Series};

const REQUIRED_ARRAYS: [&str; 3] = ["daily", "intraday", "corp_actions"];
const REQUIRED_PRICE_FIELDS: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

/// Cleaned input, read once at entry. Corporate actions are advisory:
/// only the retained row count reaches the snapshot.
#[derive(Debug, Clone)]
pub struct LoadedInput {
    pub daily: Series,
    pub intraday: Series,
    pub corp_actions_rows: usize,
}

pub fn load_input(path: &Path) -> Result<LoadedInput> {
    let content = std::fs::read_to_string(path)?;
    let raw: Value = serde_json::from_str(&content)?;
    parse_input(&raw)
}

pub fn parse_input(raw: &Value) -> Result<LoadedInput> {
    for key in REQUIRED_ARRAYS {
        match raw.get(key) {
            Some(Value::Array(rows)) if !rows.is_empty() => {}
            _ => {
                return Err(AppError::InputShape(format!(
                    "missing required array: {}",
                    key
                )))
            }
        }
    }

    let daily = clean_series(raw["daily"].as_array().unwrap(), "daily")?;
    let intraday = clean_series(raw["intraday"].as_array().unwrap(), "intraday")?;

    let corp_actions_rows = raw["corp_actions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|row| corp_action_datetime(row).is_some())
        .count();

    debug!(
        daily_rows = daily.len(),
        intraday_rows = intraday.len(),
        corp_actions_rows,
        "input cleaned"
    );

    Ok(LoadedInput { daily, intraday, corp_actions_rows })
}

fn clean_series(rows: &[Value], name: &str) -> Result<Series> {
    for row in rows.iter().take(1) {
        for field in REQUIRED_PRICE_FIELDS {
            if row.get(field).is_none() {
                return Err(AppError::InputShape(format!(
                    "{} missing required field: {}",
                    name, field
                )));
            }
        }
    }

    let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        match parse_bar(row) {
            Some(bar) if bar.is_valid() => bars.push(bar),
            _ => dropped += 1,
        }
    }
    if dropped > 0 {
        warn!(series = name, dropped, "dropped invalid rows during cleaning");
    }

    bars.sort_by_key(|b| b.datetime);
    bars.dedup_by_key(|b| b.datetime);

    if bars.is_empty() {
        return Err(AppError::EmptySeries(format!("{} has no valid rows", name)));
    }
    Ok(bars)
}

fn parse_bar(row: &Value) -> Option<Bar> {
    let datetime = parse_datetime(row.get("datetime")?)?;
    Some(Bar::new(
        datetime,
        coerce_f64(row.get("open")?)?,
        coerce_f64(row.get("high")?)?,
        coerce_f64(row.get("low")?)?,
        coerce_f64(row.get("close")?)?,
        coerce_f64(row.get("volume")?)?,
    ))
}

fn corp_action_datetime(row: &Value) -> Option<DateTime<Utc>> {
    if let Some(dt) = row.get("datetime").and_then(parse_datetime_opt) {
        return Some(dt);
    }
    // Side-table rows may carry epoch milliseconds instead.
    row.get("timestamp")
        .and_then(Value::as_i64)
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

fn parse_datetime_opt(value: &Value) -> Option<DateTime<Utc>> {
    parse_datetime(value)
}

/// Accepts RFC 3339 strings, bare `YYYY-MM-DD[ HH:MM:SS]` strings, and
/// integer epochs (milliseconds when the magnitude says so).
fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
            }
            None
        }
        Value::Number(n) => {
            let epoch = n.as_i64()?;
            if epoch.abs() >= 100_000_000_000 {
                Utc.timestamp_millis_opt(epoch).single()
            } else {
                Utc.timestamp_opt(epoch, 0).single()
            }
        }
        _ => None,
    }
}

/// Numeric coercion: accept JSON numbers and numeric strings alike.
fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bar_row(dt: &str, close: f64) -> Value {
        json!({
            "datetime": dt,
            "open": close - 1.0,
            "high": close + 1.0,
            "low": close - 2.0,
            "close": close,
            "volume": 1000
        })
    }

    #[test]
    fn test_missing_array_is_fatal() {
        let raw = json!({"daily": [bar_row("2024-01-02", 10.0)], "intraday": []});
        let err = parse_input(&raw).unwrap_err();
        assert!(matches!(err, AppError::InputShape(_)));
    }

    #[test]
    fn test_empty_array_is_fatal() {
        let raw = json!({
            "daily": [bar_row("2024-01-02", 10.0)],
            "intraday": [],
            "corp_actions": [{}]
        });
        assert!(parse_input(&raw).is_err());
    }

    #[test]
    fn test_rows_sorted_and_deduped() {
        let raw = json!({
            "daily": [
                bar_row("2024-01-03", 11.0),
                bar_row("2024-01-02", 10.0),
                bar_row("2024-01-03", 99.0),
            ],
            "intraday": [bar_row("2024-01-03 09:00:00", 10.5)],
            "corp_actions": [{"datetime": "2024-01-02"}]
        });
        let input = parse_input(&raw).unwrap();
        assert_eq!(input.daily.len(), 2);
        assert!(input.daily[0].datetime < input.daily[1].datetime);
        // First occurrence wins on duplicate timestamps.
        assert_eq!(input.daily[1].close, 11.0);
        assert_eq!(input.corp_actions_rows, 1);
    }

    #[test]
    fn test_invalid_rows_dropped_then_empty_is_fatal() {
        let raw = json!({
            "daily": [{
                "datetime": "not-a-date",
                "open": 1.0, "high": 1.0, "low": 1.0, "close": 1.0, "volume": 1
            }],
            "intraday": [bar_row("2024-01-02 09:00:00", 10.0)],
            "corp_actions": [{}]
        });
        let err = parse_input(&raw).unwrap_err();
        assert!(matches!(err, AppError::EmptySeries(_)));
    }

    #[test]
    fn test_numeric_strings_coerced() {
        let raw = json!({
            "daily": [{
                "datetime": "2024-01-02",
                "open": "9.5", "high": "10.5", "low": "9.0",
                "close": "10.0", "volume": "12345"
            }],
            "intraday": [bar_row("2024-01-02 09:00:00", 10.0)],
            "corp_actions": [{"timestamp": 1704153600000i64}]
        });
        let input = parse_input(&raw).unwrap();
        assert_eq!(input.daily[0].close, 10.0);
        assert_eq!(input.daily[0].volume, 12345.0);
        assert_eq!(input.corp_actions_rows, 1);
    }
}
