use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    skydash_core::init()?;

    let (config, _validation) = skydash_core::Config::load_validated()?;

    tracing::info!("SkyDash starting");
    tracing::info!("  Data directory: {}", config.data_dir.display());
    tracing::info!("  Weather provider: {}", config.weather.api_base_url);

    skydash_server::run(config).await?;

    tracing::info!("SkyDash stopped");
    Ok(())
}
