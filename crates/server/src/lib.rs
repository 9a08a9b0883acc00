use axum::Router;
use config::ServerConfig;
use metashare_sync::responder::Responder;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod auth;
pub mod config;
pub mod error;
mod sync;

/// Builds the HTTP application serving the sync api.
#[must_use]
pub fn router(config: &ServerConfig, responder: Responder) -> Router {
    Router::new()
        .merge(sync::setup(config, responder))
        .layer(TraceLayer::new_for_http())
}

/// Serves the sync api on every configured address until a listener fails.
///
/// Addresses that cannot be bound are skipped as long as one remains.
pub async fn start(config: ServerConfig, responder: Responder) -> eyre::Result<()> {
    let mut listeners = Vec::with_capacity(config.listen.len());
    let mut want_listeners = config.listen.iter().peekable();

    while let Some(addr) = want_listeners.next() {
        match TcpListener::bind(addr).await {
            Ok(listener) => listeners.push(listener),
            Err(err) => {
                if want_listeners.peek().is_none() && listeners.is_empty() {
                    eyre::bail!(err);
                }

                warn!(%addr, %err, "Failed to bind listener");
            }
        }
    }

    let app = router(&config, responder);

    let mut set = JoinSet::new();

    for listener in listeners {
        info!(addr = %listener.local_addr()?, "Sync api listening");

        let app = app.clone();
        let _ignored = set.spawn(async move { axum::serve(listener, app).await });
    }

    while let Some(result) = set.join_next().await {
        result??;
    }

    Ok(())
}
