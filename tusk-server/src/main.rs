use anyhow::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = tusk_server::tusk_config().snapshot();
    let ax = tusk_server::build(&config).await?;

    if let Some(sweeper) = tusk_server::sweeper(&ax, &config)? {
        tokio::spawn(sweeper.start());
    }

    let host = config.get_string("http.host").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = config.get_string("http.port").unwrap_or_else(|| "8000".to_string());
    let addr = format!("{host}:{port}");

    info!(%addr, base_path = %ax.settings().base_path, "listening");

    ax.listen(addr).await?;

    Ok(())
}
