use rolegate::{
    app::{build_app, serve},
    config::AppConfig,
    logging,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init("rolegate=debug,axum=info,tower_http=info");

    let config = AppConfig::from_env()?;
    let app_state = AppState::init(config).await?;

    serve(build_app(app_state)).await
}
