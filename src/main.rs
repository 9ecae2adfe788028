// src/main.rs

use std::process::ExitCode;
use std::sync::Arc;

use dotenvy::dotenv;
use exam_platform::config::Config;
use exam_platform::exam::bank::QuestionBank;
use exam_platform::routes;
use exam_platform::state::AppState;
use exam_platform::store::{ExamStore, MemoryStore, PgStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file (if present)
    dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "exam.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let bank = QuestionBank::embedded()?;
    tracing::info!("Question bank loaded: {} questions", bank.len());

    // The pool connects on the first request; migrations run then.
    let store: Arc<dyn ExamStore> = match &config.database_url {
        Some(url) => Arc::new(PgStore::connect_lazy(url)?),
        None => {
            tracing::warn!("DATABASE_URL is not set, keeping all data in memory");
            Arc::new(MemoryStore::new())
        }
    };

    if config.admin_password_hash.is_none() {
        tracing::warn!("No ADMIN_PASSWORD_HASH or ADMIN_PASSWORD set, admin login is disabled");
    }

    let bind_addr = config.bind_addr.clone();

    let state = AppState {
        store,
        bank: Arc::new(bank),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
