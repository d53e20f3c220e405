//! sqltalk HTTP server
//!
//! Accepts a natural-language prompt plus MySQL credentials on `POST /query`,
//! asks an OpenAI-compatible model for the SQL, runs it and returns the rows.

use sqltalk_core::QueryPipeline;
use sqltalk_mysql::MySqlConnector;
use std::sync::Arc;
use tracing::info;

mod config;
mod http;
mod llm;
mod logging;
mod metrics;
mod query;

#[cfg(test)]
mod testing;

use config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config_path = std::env::var("SQLTALK_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    config.apply_logging_env();
    logging::init();

    let api_key = Config::get_openai_api_key()?;
    info!(
        model = %config.llm.model,
        api_base = config.llm.api_base.as_deref().unwrap_or("default"),
        "Language model configured"
    );
    let model = llm::OpenAiModel::new(api_key, &config.llm);

    let pipeline = QueryPipeline::new(Arc::new(MySqlConnector::new()), Arc::new(model))
        .with_resolver(config.resolver())
        .with_options(config.pipeline_options());
    info!(
        threshold = pipeline.resolver().threshold(),
        dedupe_tables = pipeline.options().dedupe_tables,
        strict_tables = pipeline.options().strict_tables,
        "Query pipeline ready"
    );

    let state = http::AppState::new(pipeline, metrics::Metrics::new()?);
    let app = http::router(state, &config.cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Starting sqltalk server on http://{}", addr);
    info!("CORS origins: {:?}", config.cors.allowed_origins);

    axum::serve(listener, app).await?;

    Ok(())
}
