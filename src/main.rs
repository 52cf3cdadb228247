mod config;

use clap::Parser as _;
use config::Config;
use guardrail_relay::{
    AppState, build_metrics_layer_and_handle, build_metrics_router, build_router,
};
use tokio::net::TcpListener;
use tracing::{error, info, instrument};

#[tokio::main]
#[instrument]
pub async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse().validate()?;
    info!("Starting Guardrail relay with config: {:?}", config);

    let target = config.target()?;
    let app_state = AppState::new(target, config.pool());
    let mut router = build_router(app_state);

    if config.metrics {
        let (prometheus_layer, handle) =
            build_metrics_layer_and_handle(config.metrics_prefix.clone());
        router = router.layer(prometheus_layer);

        let metrics_addr = config.metrics_addr();
        let metrics_listener = TcpListener::bind(metrics_addr).await?;
        info!("Metrics endpoint listening on {}", metrics_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(metrics_listener, build_metrics_router(handle)).await {
                error!("Metrics server failed: {}", e);
            }
        });
    }

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(bind_addr).await?;
    info!("Guardrail relay listening on {}", bind_addr);

    axum::serve(listener, router).await?;

    Ok(())
}
