use std::sync::Arc;

use tracing::info;

use wechat_inbox::config::AppConfig;
use wechat_inbox::push::PushClient;
use wechat_inbox::server::{self, AppState};
use wechat_inbox::store::{CsvStore, MessageStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn MessageStore> = Arc::new(CsvStore::new(config.store_path.clone()));

    let push = config.push.as_ref().map(|creds| {
        Arc::new(PushClient::new(
            creds.app_id.clone(),
            creds.app_secret.clone(),
        ))
    });

    info!("wechat-inbox v{}", env!("CARGO_PKG_VERSION"));
    info!(store = %config.store_path.display(), mode = ?config.write_mode, "store configured");
    info!(
        signature_gate = config.token.is_some(),
        push = push.is_some(),
        "webhook configured"
    );

    let state = AppState {
        store,
        push,
        token: config.token.clone(),
        write_mode: config.write_mode,
    };
    let app = server::routes(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!(addr = %config.bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
