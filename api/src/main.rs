mod query_payload;
mod routes;
mod upload_params;

use anyhow::Result;
use pdf_qa::config::{parse_var, var};
use pdf_qa::{AppConfig, DocumentProcessor, GroqService, Session};
use routes::AppState;
use std::sync::Arc;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment variables and logging
    dotenv::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;
    let addr = var("PDF_QA_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
    let max_upload_bytes = parse_var("PDF_QA_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
    log::info!("Starting with {:?}", config.answer_service);
    if config.answer_service.api_key.is_none() {
        log::warn!("GROQ_API_KEY is not set; questions will fail until it is configured");
    }

    let answers = Arc::new(GroqService::new(config.answer_service)?);
    let session = Session::start(config.session, Arc::new(DocumentProcessor::new()), answers);
    let app = routes::router(Arc::new(AppState::new(session)), max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the router dropped the session, which removes its upload.
    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
