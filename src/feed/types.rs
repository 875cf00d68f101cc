use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::FetchError;

/// One timestamped measurement of portfolio value, cash and positions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub timestamp: String,
    pub total_value: f64,
    pub total_cash: f64,
    pub total_positions: f64,
    /// Epoch milliseconds derived from `timestamp`.
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub trade_id: i64,
    pub timestamp: String,
    pub strategy: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub ts: i64,
}

/// API health as shown by the status dot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Health {
    /// No check has resolved yet.
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl Health {
    pub fn label(&self) -> &'static str {
        match self {
            Health::Unknown => "Checking API...",
            Health::Healthy => "API is healthy",
            Health::Unhealthy => "API is unreachable",
        }
    }
}

// Wire shapes: what the API returns, before `ts` is derived.

#[derive(Debug, Deserialize)]
pub(crate) struct PortfolioRow {
    timestamp: String,
    total_value: f64,
    total_cash: f64,
    total_positions: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TradeRow {
    trade_id: i64,
    timestamp: String,
    strategy: String,
    symbol: String,
    side: Side,
    quantity: f64,
    price: f64,
}

/// Rows must be JSON objects. serde's derived structs would also take an
/// array in field order, which the API never sends.
fn parse_rows<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, FetchError> {
    let rows: Vec<Value> = serde_json::from_slice(body)?;
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if !row.is_object() {
                return Err(FetchError::Malformed(format!("row {} is not an object", i)));
            }
            Ok(serde_json::from_value(row)?)
        })
        .collect()
}

/// Drop a trailing `.<digits>` fractional-seconds suffix, if present.
pub fn truncate_fraction(timestamp: &str) -> &str {
    match timestamp.rfind('.') {
        Some(dot) => {
            let tail = &timestamp[dot + 1..];
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                &timestamp[..dot]
            } else {
                timestamp
            }
        }
        None => timestamp,
    }
}

/// Epoch milliseconds for an API timestamp, after truncating sub-second digits.
///
/// Offset-qualified values are parsed as RFC 3339. Naive values (`T` or space
/// separated, or a bare date) are taken as UTC.
pub fn parse_ts_ms(timestamp: &str) -> Result<i64, FetchError> {
    let trimmed = truncate_fraction(timestamp.trim());
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    Err(FetchError::Malformed(format!("unparseable timestamp {:?}", timestamp)))
}

impl PortfolioRow {
    pub(crate) fn normalize(self) -> Result<PortfolioSnapshot, FetchError> {
        let ts = parse_ts_ms(&self.timestamp)?;
        Ok(PortfolioSnapshot {
            timestamp: self.timestamp,
            total_value: self.total_value,
            total_cash: self.total_cash,
            total_positions: self.total_positions,
            ts,
        })
    }
}

impl TradeRow {
    pub(crate) fn normalize(self) -> Result<TradeRecord, FetchError> {
        let ts = parse_ts_ms(&self.timestamp)?;
        Ok(TradeRecord {
            trade_id: self.trade_id,
            timestamp: self.timestamp,
            strategy: self.strategy,
            symbol: self.symbol,
            side: self.side,
            quantity: self.quantity,
            price: self.price,
            ts,
        })
    }
}

/// Parse a `/portfolio` body, keeping API order.
pub fn parse_portfolio(body: &[u8]) -> Result<Vec<PortfolioSnapshot>, FetchError> {
    let rows: Vec<PortfolioRow> = parse_rows(body)?;
    rows.into_iter().map(PortfolioRow::normalize).collect()
}

/// Parse a `/trades` body and order it newest first. The sort is stable so
/// trades sharing a timestamp keep their API order.
pub fn parse_trades(body: &[u8]) -> Result<Vec<TradeRecord>, FetchError> {
    let rows: Vec<TradeRow> = parse_rows(body)?;
    let mut trades = rows
        .into_iter()
        .map(TradeRow::normalize)
        .collect::<Result<Vec<_>, _>>()?;
    sort_newest_first(&mut trades);
    Ok(trades)
}

pub fn sort_newest_first(trades: &mut [TradeRecord]) {
    trades.sort_by(|a, b| b.ts.cmp(&a.ts));
}

/// Interpret a `/health` response. Anything but a success status carrying
/// `{"status": "ok"}` is unhealthy.
pub fn interpret_health(status: u16, body: &[u8]) -> Health {
    if !(200..300).contains(&status) {
        return Health::Unhealthy;
    }
    let ok = serde_json::from_slice::<Value>(body)
        .ok()
        .as_ref()
        .and_then(Value::as_object)
        .and_then(|o| o.get("status"))
        .and_then(Value::as_str)
        == Some("ok");
    if ok {
        Health::Healthy
    } else {
        Health::Unhealthy
    }
}
