mod admin;
mod app;
mod auth;
mod config;
mod dashboard;
mod error;
mod identity;
mod state;
#[cfg(test)]
mod testing;

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "marketgate=debug,axum=info,tower_http=info,sqlx=warn".into());
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt.with_target(false).json().init(),
        _ => fmt.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = state::AppState::init().await?;
    let addr = state.config.bind_addr;
    app::serve(app::build_app(state), addr, app::shutdown_signal()).await
}
