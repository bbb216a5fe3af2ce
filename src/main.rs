use anyhow::anyhow;
use log::info;

use linkmarket::config::AppConfig;
use linkmarket::server::start_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    // 설정 로드 (.env 포함)
    let config = AppConfig::from_env();
    info!(
        "설정: port={} db={} sweep={:?}",
        config.rest_port, config.database_url, config.sweep_interval
    );

    start_server(config).await.map_err(|e| anyhow!("{}", e))?;

    Ok(())
}
