use financial_query_orchestrator::{
    api::{create_retriever_router, start_server},
    config::Settings,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;

    info!("Vector Retriever");
    info!("Port: {}", settings.retriever_port);
    info!("Index: {}", settings.index_path.display());

    // Always the local store; RETRIEVER_BASE_URL only applies to the orchestrator.
    let index = settings.retriever_index().await;

    start_server(create_retriever_router(index), settings.retriever_port).await?;

    Ok(())
}
