//! Composition root.
//!
//! Wires configuration, the document store, the payment client, the route
//! table and the middleware pipeline together, then serves until a shutdown
//! signal arrives.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use axum::Router;
use tokio::{net::TcpListener, signal};

use crate::{
    config::Config,
    db::{self, MongoStore},
    error::StartupError,
    middleware::{
        pipeline::{Pipeline, PipelineContext},
        rate_limit::RateLimiter,
    },
    payments::PaymentClient,
    routes,
    store::DocumentStore,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub payments: Arc<PaymentClient>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, payments: PaymentClient) -> Self {
        Self {
            store,
            payments: Arc::new(payments),
        }
    }
}

/// Build the full application: routes, static fallback, then the pipeline.
///
/// # Errors
///
/// Fails if a pipeline stage cannot be built from configuration (for
/// example an unusable `ALLOWED_ORIGIN`).
pub fn build_app(
    state: AppState,
    config: &Config,
    limiter: Arc<RateLimiter>,
) -> Result<Router, StartupError> {
    let router = routes::with_static_fallback(routes::api_routes(), &config.public_dir)
        .with_state(state);

    let context = PipelineContext::from_config(config, limiter)?;
    let pipeline = Pipeline::from_config(config);
    tracing::info!(stages = ?pipeline.stages(), "middleware pipeline configured");

    Ok(pipeline.apply(router, &context))
}

/// Rate limiter sized from configuration.
pub fn rate_limiter(config: &Config) -> Arc<RateLimiter> {
    Arc::new(
        RateLimiter::new(config.rate_limit_window(), config.rate_limit_max)
            .trust_proxy(config.trust_proxy),
    )
}

/// Run the server until Ctrl+C or SIGTERM.
///
/// # Startup Flow
///
/// 1. Connect to MongoDB (with retries)
/// 2. Build the payment client
/// 3. Build routes and the middleware pipeline
/// 4. Bind the listener and serve, draining in-flight requests on shutdown
pub async fn run(config: Config) -> anyhow::Result<()> {
    let database = db::connect(&config).await?;

    let payments = PaymentClient::new(&config.stripe_private_key, config.request_timeout())?;

    let limiter = rate_limiter(&config);
    let sweeper = limiter.clone().spawn_sweeper(config.rate_limit_window());

    let state = AppState::new(Arc::new(MongoStore::new(database)), payments);
    tracing::info!(api_base = %state.payments.api_base(), "Payment client initialized");
    let app = build_app(state, &config, limiter)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    tracing::info!("Server is running on port: {}", config.port);

    serve(listener, app, shutdown_signal()).await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

/// Serve `app` on `listener` until `shutdown` resolves.
///
/// Once `shutdown` resolves the listener stops accepting, and the call
/// returns after in-flight requests have completed.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Peer addresses are needed by the rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
