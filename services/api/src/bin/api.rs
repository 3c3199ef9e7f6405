//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{AiServerClient, DbAdapter, OpenAiTtsAdapter, SmtpMailer},
    auth::TokenService,
    config::Config,
    error::ApiError,
    report::{ReportScheduler, ReportWorkflow},
    web::{self, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let tts_adapter = Arc::new(OpenAiTtsAdapter::from_names(
        openai_client,
        &config.tts_model,
        &config.tts_voice,
    )?);

    let ai_client = Arc::new(AiServerClient::new(
        &config.ai_server_url,
        config.ai_timeout,
        config.diagnosis_timeout,
    )?);
    let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);

    // --- 4. Build the Report Workflow & Scheduler ---
    let reports = Arc::new(ReportWorkflow::new(
        db_adapter.clone(),
        ai_client.clone(),
        mailer,
    )?);
    let scheduler = Arc::new(ReportScheduler::new(
        reports.clone(),
        config.report_schedule,
    ));
    if config.scheduler_enabled {
        scheduler.start();
    } else {
        warn!("Weekly report scheduler disabled by configuration");
    }

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        tokens: TokenService::new(&config.secret_key, config.access_token_ttl),
        tts_adapter,
        care_ai: ai_client,
        reports,
        scheduler: scheduler.clone(),
    });

    // --- 6. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state)?)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
