//! Main orchestrator - one pass per query
//!
//! PARSE → FETCH (fan-out) → INDEX → RETRIEVE → CONTEXT → GENERATE → SPEAK
//!
//! Every collaborator failure is folded into the response; `handle` itself
//! cannot fail.

use crate::dispatch::DataFetchDispatcher;
use crate::error::OrchestrationError;
use crate::generation::Generator;
use crate::models::{AggregateResponse, QueryResult, RetrievalOutcome, TickerMap};
use crate::parser::IntentParser;
use crate::speech::Speaker;
use crate::store::DocumentIndex;
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Documents fetched per request from the shared index.
const RETRIEVAL_TOP_K: usize = 1;

const NO_ANSWER: &str = "Sorry, I don't have an answer.";

/// `"{ticker} info:\n{result}"`, the unit both indexed and sent to generation.
pub fn ticker_document(ticker: &str, result: &QueryResult) -> String {
    format!("{} info:\n{}", ticker, result)
}

/// Join per-ticker documents, in ticker order, with blank lines.
pub fn build_context(agent_data: &TickerMap<QueryResult>) -> String {
    agent_data
        .iter()
        .map(|(ticker, result)| ticker_document(ticker, result))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct Orchestrator {
    parser: IntentParser,
    dispatcher: DataFetchDispatcher,
    index: Arc<dyn DocumentIndex>,
    generator: Arc<dyn Generator>,
    speaker: Arc<dyn Speaker>,
}

impl Orchestrator {
    pub fn new(
        parser: IntentParser,
        dispatcher: DataFetchDispatcher,
        index: Arc<dyn DocumentIndex>,
        generator: Arc<dyn Generator>,
        speaker: Arc<dyn Speaker>,
    ) -> Self {
        Self {
            parser,
            dispatcher,
            index,
            generator,
            speaker,
        }
    }

    /// Answer one user query.
    pub async fn handle(&self, query: &str) -> AggregateResponse {
        let span = info_span!("query", request_id = %Uuid::new_v4());
        self.run(query).instrument(span).await
    }

    async fn run(&self, query: &str) -> AggregateResponse {
        let start = Instant::now();
        info!(query, "Handling query");

        // === PARSE ===
        let ticker_intent_map = self.parser.parse(query);
        debug!(map = ?ticker_intent_map, "Parsed ticker-intent map");

        // === FETCH ===
        let fetches = ticker_intent_map.iter().map(|(ticker, intent)| async move {
            (ticker.to_string(), self.dispatcher.fetch(ticker, *intent).await)
        });
        let agent_data: TickerMap<QueryResult> = join_all(fetches).await.into_iter().collect();

        // === INDEX ===
        if !agent_data.is_empty() {
            let documents = agent_data
                .iter()
                .map(|(ticker, result)| ticker_document(ticker, result))
                .collect();
            match self.index.add_documents(documents).await {
                Ok(added) => debug!(added, "Indexed fetched data"),
                Err(e) => warn!(error = %e, "Failed to index fetched data"),
            }
        }

        // === RETRIEVE ===
        // Computed for the response only; it is not fed into generation below.
        let retriever_result = match self.index.search(query, RETRIEVAL_TOP_K).await {
            Ok(results) => RetrievalOutcome::Found { results },
            Err(OrchestrationError::EmptyIndex) => RetrievalOutcome::NoData {
                detail: OrchestrationError::EmptyIndex.to_string(),
            },
            Err(e) => {
                warn!(error = %e, "Retriever query failed");
                RetrievalOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        // === GENERATE ===
        let context = build_context(&agent_data);
        let (llm_response, answer) = match self.generator.generate(query, &[context]).await {
            Ok(text) => (json!({ "response": text }), Some(text)),
            Err(e) => {
                warn!(error = %e, "Generation failed");
                (json!({ "error": e.to_string() }), None)
            }
        };

        // === SPEAK ===
        let speech_text = answer.as_deref().unwrap_or(NO_ANSWER);
        match self.speaker.speak(speech_text).await {
            Ok(message) => debug!(%message, "Speech output done"),
            Err(e) => warn!(error = %e, "Speech output failed"),
        }

        info!(
            tickers = ticker_intent_map.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query handled"
        );

        AggregateResponse {
            user_query: query.to_string(),
            ticker_intent_map,
            agent_data,
            retriever_result,
            llm_response,
        }
    }
}
