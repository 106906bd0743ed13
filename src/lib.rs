//! Financial Query Orchestrator
//!
//! Retrieval-augmented orchestration for a financial question-answering
//! assistant:
//! - Parses free-form queries into ticker → intent maps
//! - Fans out to market-data, earnings, history and scraping services
//! - Accumulates fetched text in a persistent vector index
//! - Assembles context for answer generation and speech output
//!
//! PIPELINE:
//! PARSE → FETCH → INDEX → RETRIEVE → CONTEXT → GENERATE → SPEAK

pub mod agent;
pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generation;
pub mod http;
pub mod models;
pub mod parser;
pub mod speech;
pub mod store;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use parser::{IntentParser, ParserConfig};
