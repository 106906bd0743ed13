//! Data-fetch dispatcher
//!
//! Maps a (ticker, intent) pair onto calls against the market-data,
//! earnings, historical and scraping collaborators. Every failure is folded
//! into the returned JSON so the orchestrator always gets one result per
//! ticker.

use crate::http::{JsonClient, DEFAULT_TIMEOUT};
use crate::models::{DateRange, Intent, QueryResult};
use crate::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// External financial data collaborators
#[async_trait::async_trait]
pub trait FinancialDataApi: Send + Sync {
    async fn market_data(&self, ticker: &str) -> Result<Value>;
    async fn earnings(&self, ticker: &str) -> Result<Value>;
    async fn historical(&self, ticker: &str, range: DateRange) -> Result<Value>;
    async fn scrape_summary(&self, ticker: &str) -> Result<Value>;
}

/// HTTP-backed collaborators. Market data, earnings and history share one
/// service; the scrape-and-summarize service may live elsewhere.
#[derive(Clone)]
pub struct HttpFinancialApi {
    market: JsonClient,
    scraper: JsonClient,
}

impl HttpFinancialApi {
    pub fn new(market_base_url: &str, scraper_base_url: &str) -> Result<Self> {
        Ok(Self {
            market: JsonClient::new(market_base_url, DEFAULT_TIMEOUT)?,
            scraper: JsonClient::new(scraper_base_url, DEFAULT_TIMEOUT)?,
        })
    }
}

#[async_trait::async_trait]
impl FinancialDataApi for HttpFinancialApi {
    async fn market_data(&self, ticker: &str) -> Result<Value> {
        let path = format!("/marketdata/{}", ticker);
        self.market.get(&path, &[]).await?.into_success(&path)
    }

    async fn earnings(&self, ticker: &str) -> Result<Value> {
        let path = format!("/earnings/{}", ticker);
        self.market.get(&path, &[]).await?.into_success(&path)
    }

    async fn historical(&self, ticker: &str, range: DateRange) -> Result<Value> {
        let path = format!("/historical/{}", ticker);
        let query = [
            ("start", range.start.format("%Y-%m-%d").to_string()),
            ("end", range.end.format("%Y-%m-%d").to_string()),
        ];
        self.market.get(&path, &query).await?.into_success(&path)
    }

    async fn scrape_summary(&self, ticker: &str) -> Result<Value> {
        let path = format!("/push_scraped_data/{}", ticker);
        self.scraper
            .post::<Value>(&path, None)
            .await?
            .into_success(&path)
    }
}

pub struct DataFetchDispatcher {
    api: Arc<dyn FinancialDataApi>,
    default_range: DateRange,
}

impl DataFetchDispatcher {
    pub fn new(api: Arc<dyn FinancialDataApi>, default_range: DateRange) -> Self {
        Self { api, default_range }
    }

    /// Fetch data for one ticker with the default historical range.
    pub async fn fetch(&self, ticker: &str, intent: Intent) -> QueryResult {
        self.fetch_with_range(ticker, intent, None).await
    }

    pub async fn fetch_with_range(
        &self,
        ticker: &str,
        intent: Intent,
        range: Option<DateRange>,
    ) -> QueryResult {
        debug!(ticker, %intent, "Dispatching fetch");

        match intent {
            Intent::Price => capture(ticker, "marketdata", self.api.market_data(ticker).await),
            Intent::Earnings => {
                // both calls always run, neither cancels the other
                let (api_earnings, scraping) =
                    tokio::join!(self.api.earnings(ticker), self.api.scrape_summary(ticker));
                json!({
                    "api_earnings": capture(ticker, "earnings", api_earnings),
                    "scraping": capture(ticker, "scraping", scraping),
                })
            }
            Intent::Historical => {
                let range = range.unwrap_or(self.default_range);
                capture(ticker, "historical", self.api.historical(ticker, range).await)
            }
        }
    }
}

fn capture(ticker: &str, source: &str, result: Result<Value>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(ticker, source, error = %e, "Collaborator call failed");
            json!({ "error": e.to_string() })
        }
    }
}
