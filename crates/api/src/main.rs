use anyhow::Context;

use productsvc_infra::ServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    productsvc_observability::init();

    let config = ServiceConfig::from_env().context("invalid configuration")?;

    // Credentials, store and broker are wired before the listener opens; a
    // failed secrets bootstrap ends the process here.
    let services = productsvc_api::app::services::build_services(&config)
        .await
        .context("startup failed")?;

    let app = productsvc_api::app::build_app(std::sync::Arc::new(services));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, queue = %config.queue, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
