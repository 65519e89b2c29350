use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

use leadserver::core::automation::AutomationService;
use leadserver::core::config::AppConfig;
use leadserver::core::shared::state::AppState;
use leadserver::core::shared::utils::{create_conn, redact_database_url, run_migrations};
use leadserver::leads::{LeadStore, MemoryLeadStore, PgLeadStore};
use leadserver::main_module::run_axum_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let in_memory = args.iter().any(|a| a == "--memory");

    let config = AppConfig::from_env()?;

    let store: Arc<dyn LeadStore> = if in_memory {
        warn!("Running with the in-memory store; data is lost on exit");
        Arc::new(MemoryLeadStore::new())
    } else {
        let database_url = config
            .database_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required unless --memory is given"))?;
        info!("Connecting to {}", redact_database_url(&database_url));
        let pool = create_conn(&database_url)?;
        run_migrations(&pool).map_err(|e| anyhow::anyhow!("Migrations failed: {e}"))?;
        info!("Database migrations applied");
        Arc::new(PgLeadStore::new(pool))
    };

    let app_state = Arc::new(AppState::new(config, store));

    let automation = AutomationService::new(Arc::clone(&app_state));
    tokio::spawn(async move {
        if let Err(e) = automation.spawn().await {
            error!("Lead rescoring scheduler stopped: {}", e);
        }
    });

    info!(
        "Starting leadserver {} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        app_state.config.server.host,
        app_state.config.server.port
    );
    run_axum_server(app_state).await?;
    info!("Server stopped");
    Ok(())
}
