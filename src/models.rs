//! Core data models for the financial query orchestrator

use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::OrchestrationError;

//
// ================= Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Price,
    Earnings,
    Historical,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intent::Price => "price",
            Intent::Earnings => "earnings",
            Intent::Historical => "historical",
        };
        write!(f, "{}", s)
    }
}

//
// ================= Ticker-keyed map =================
//

/// Map keyed by ticker that remembers first-appearance order.
///
/// Inserting an existing ticker replaces its value in place, so the ticker
/// keeps the position of its first occurrence. Serializes as a JSON object
/// in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> TickerMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, ticker: impl Into<String>, value: V) {
        let ticker = ticker.into();
        match self.entries.iter_mut().find(|(t, _)| *t == ticker) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((ticker, value)),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(t, _)| t == ticker)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v))
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for TickerMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for TickerMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut map = TickerMap::new();
        for (ticker, value) in iter {
            map.insert(ticker, value);
        }
        map
    }
}

impl<V: Serialize> Serialize for TickerMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (ticker, value) in &self.entries {
            map.serialize_entry(ticker, value)?;
        }
        map.end()
    }
}

pub type TickerIntentMap = TickerMap<Intent>;

/// Opaque per-ticker payload produced by the dispatcher.
pub type QueryResult = serde_json::Value;

//
// ================= Date range =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> crate::Result<Self> {
        if start > end {
            return Err(OrchestrationError::Validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> crate::Result<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }
}

fn parse_date(value: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        OrchestrationError::Validation(format!("Invalid date format '{}': {}", value, e))
    })
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap_or_default(),
        }
    }
}

//
// ================= Retrieval =================
//

/// Outcome of the per-request store lookup.
///
/// `NoData` is kept apart from `Failed` so callers can tell an empty
/// index from a broken one.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RetrievalOutcome {
    #[serde(rename = "ok")]
    Found { results: Vec<String> },
    NoData { detail: String },
    #[serde(rename = "error")]
    Failed { error: String },
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResponse {
    pub user_query: String,
    pub ticker_intent_map: TickerIntentMap,
    pub agent_data: TickerMap<QueryResult>,
    pub retriever_result: RetrievalOutcome,
    pub llm_response: serde_json::Value,
}
