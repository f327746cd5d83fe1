use anyhow::Context;

use chaintrack_infra::ChainConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ChainConfig::from_env().context("invalid configuration")?;

    chaintrack_observability::init(&config.log).context("invalid log filter")?;

    if config.uses_dev_secret() {
        tracing::warn!("CHAINTRACK_JWT_SECRET not set; using insecure dev default");
    }

    let app = chaintrack_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        status_policy = %config.status_policy,
        low_stock_threshold = config.low_stock_threshold,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
