use std::net::SocketAddr;

use anyhow::Context;

use courtside_infra::AccessConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    courtside_observability::init();

    let config = AccessConfig::from_env().context("invalid configuration")?;
    let state = courtside_api::app::build_state(&config)
        .await
        .context("failed to wire backends")?;

    let app = courtside_api::app::build_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
