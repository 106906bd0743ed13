//! Query intent parser
//!
//! Splits a free-form query into phrases on the word "and", pulls out
//! ticker-shaped tokens (1-5 uppercase letters) and tags each one with the
//! intent of the phrase it appeared in.
//!
//! Ticker extraction is a bare pattern match: capitalized words such as
//! "I" or "US" are picked up too. `ParserConfig` exposes deny/allow lists
//! for deployments that want to filter those.

use crate::models::{Intent, TickerIntentMap};
use std::collections::HashSet;

/// Ordered keyword table. First category with a hit wins.
const INTENT_KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::Earnings, &["earnings", "earnings report", "report"]),
    (Intent::Historical, &["history", "historical", "past", "previous"]),
    (Intent::Price, &["price", "stock", "quote", "current price"]),
];

const PHRASE_SEPARATOR: &str = "and";
const MAX_TICKER_LEN: usize = 5;

/// Optional filters applied to ticker candidates.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    /// Candidates that are never treated as tickers.
    pub deny: HashSet<String>,
    /// When set, only these candidates are kept.
    pub allow: Option<HashSet<String>>,
}

impl ParserConfig {
    /// Build from comma-separated lists, as read from the environment.
    pub fn from_lists(deny: Option<&str>, allow: Option<&str>) -> Self {
        Self {
            deny: deny.map(split_list).unwrap_or_default(),
            allow: allow.map(split_list).filter(|set| !set.is_empty()),
        }
    }

    fn accepts(&self, candidate: &str) -> bool {
        if self.deny.contains(candidate) {
            return false;
        }
        match &self.allow {
            Some(allow) => allow.contains(candidate),
            None => true,
        }
    }
}

fn split_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct IntentParser {
    config: ParserConfig,
}

impl IntentParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self { config }
    }

    /// Parse a query into a ticker → intent map.
    ///
    /// An empty map means no ticker-shaped token was found; it is not an error.
    pub fn parse(&self, text: &str) -> TickerIntentMap {
        let mut map = TickerIntentMap::new();

        for phrase in split_phrases(text) {
            let tickers: Vec<&str> = phrase
                .iter()
                .copied()
                .filter(|token| is_ticker_candidate(token) && self.config.accepts(token))
                .collect();

            if tickers.is_empty() {
                continue;
            }

            let intent = classify_phrase(&phrase.join(" "));
            for ticker in tickers {
                map.insert(ticker, intent);
            }
        }

        map
    }
}

/// Classify a phrase by case-insensitive keyword containment.
pub fn classify_phrase(phrase: &str) -> Intent {
    let lowered = phrase.to_lowercase();
    INTENT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|(intent, _)| *intent)
        .unwrap_or_default()
}

/// Word runs become one token, every other visible character its own token.
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut word_start: Option<usize> = None;

    for (idx, ch) in text.char_indices() {
        if is_word_char(ch) {
            word_start.get_or_insert(idx);
            continue;
        }

        if let Some(start) = word_start.take() {
            tokens.push(&text[start..idx]);
        }
        if !ch.is_whitespace() {
            tokens.push(&text[idx..idx + ch.len_utf8()]);
        }
    }

    if let Some(start) = word_start {
        tokens.push(&text[start..]);
    }

    tokens
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn split_phrases(text: &str) -> Vec<Vec<&str>> {
    tokenize(text)
        .split(|token| token.eq_ignore_ascii_case(PHRASE_SEPARATOR))
        .filter(|phrase| !phrase.is_empty())
        .map(<[&str]>::to_vec)
        .collect()
}

fn is_ticker_candidate(token: &str) -> bool {
    (1..=MAX_TICKER_LEN).contains(&token.len()) && token.bytes().all(|b| b.is_ascii_uppercase())
}
