pub mod error;
mod handlers;
mod middleware;
pub mod models;
mod state;

pub use middleware::RequestContext;
pub use state::HttpState;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::infra::error::InfraError;

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/posts", get(handlers::list_posts).post(handlers::create_post))
        .route(
            "/posts/{id}",
            get(handlers::get_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route("/posts/{id}/comments", post(handlers::create_comment))
        .route(
            "/posts/{id}/comments/{comment_id}",
            delete(handlers::delete_comment),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

/// Serve `router` until Ctrl-C or SIGTERM, then give in-flight requests
/// `grace` to finish before returning.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    grace: Duration,
) -> Result<(), InfraError> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");

    let draining = Arc::new(Notify::new());
    let signal = {
        let draining = Arc::clone(&draining);
        async move {
            shutdown_signal().await;
            draining.notify_one();
        }
    };

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result.map_err(InfraError::from),
        _ = draining.notified() => {
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.map_err(InfraError::from),
                Err(_) => {
                    warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out");
                    Ok(())
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
