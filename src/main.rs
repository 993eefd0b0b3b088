use noted::{
    app::{build_app, listen_addr, serve},
    auth::services::spawn_token_purger,
    config::AppConfig,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "noted=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(
        environment = ?config.environment,
        production = config.environment.is_production(),
        "configuration loaded"
    );

    let state = AppState::init(config).await?;

    if let Some(db) = &state.db {
        sqlx::migrate!("./migrations").run(db).await?;
        tracing::info!("migrations applied");
    } else {
        tracing::warn!("in-memory store: data is lost on restart");
    }

    let _purger = spawn_token_purger(state.clone());

    let addr = listen_addr()?;
    serve(build_app(state), addr).await
}
