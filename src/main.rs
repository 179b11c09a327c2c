use std::process;

use folio::{
    application::{blog::BlogApi, error::AppError},
    cache::CacheConfig,
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        store, telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let document_store = store::connect(&settings.store)?;
    let cache_config = CacheConfig::from(&settings.cache);
    info!(
        backend = ?settings.store.backend,
        cache_enabled = cache_config.enabled,
        "Document store connected"
    );

    let blog = BlogApi::new(document_store, cache_config);
    let state = HttpState::new(blog, settings.validation.clone());
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| InfraError::bind(addr, err))?;

    http::serve(listener, router, settings.server.graceful_shutdown).await?;
    info!("Server stopped");
    Ok(())
}
