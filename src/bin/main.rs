use financial_query_orchestrator::{
    agent::Orchestrator,
    api::{create_router, start_server},
    config::Settings,
    dispatch::{DataFetchDispatcher, HttpFinancialApi},
    generation::HttpGenerator,
    speech::HttpSpeaker,
    IntentParser,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    info!("Financial Query Orchestrator");
    info!("Port: {}", settings.orchestrator_port);
    info!(
        market = %settings.financial_api_url,
        scraper = %settings.scraper_url,
        llm = %settings.llm_url,
        tts = %settings.tts_url,
        "Collaborator services"
    );

    // Create components
    let api = HttpFinancialApi::new(&settings.financial_api_url, &settings.scraper_url)?;
    let dispatcher = DataFetchDispatcher::new(Arc::new(api), settings.historical_range);
    let index = settings.document_index().await;
    let generator = HttpGenerator::new(&settings.llm_url, settings.generation_timeout)?;
    let speaker = HttpSpeaker::new(&settings.tts_url)?;

    let orchestrator = Arc::new(Orchestrator::new(
        IntentParser::with_config(settings.parser.clone()),
        dispatcher,
        index,
        Arc::new(generator),
        Arc::new(speaker),
    ));

    info!("Orchestrator initialized");

    start_server(create_router(orchestrator), settings.orchestrator_port).await?;

    Ok(())
}
