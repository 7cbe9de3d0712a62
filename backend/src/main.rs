//! Backend entry-point: loads settings, selects adapters and serves the
//! JSON:API endpoints.

mod server;

use std::net::{IpAddr, SocketAddr};

use actix_web::web;
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use bookshelf::inbound::http::health::HealthState;
use bookshelf::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use bookshelf::settings::AppSettings;
use server::{ServerConfig, create_server};

fn bind_addr(settings: &AppSettings) -> std::io::Result<SocketAddr> {
    let host: IpAddr = settings.host().parse().map_err(|err| {
        std::io::Error::other(format!("invalid host `{}`: {err}", settings.host()))
    })?;
    Ok(SocketAddr::new(host, settings.port()))
}

/// Application bootstrap.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = AppSettings::load_from_iter(std::env::args_os())
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    let public_url = settings.public_url().map_err(std::io::Error::other)?;
    let page_settings = settings.page_settings().map_err(std::io::Error::other)?;

    let mut config = ServerConfig::new(bind_addr(&settings)?, public_url, page_settings)
        .with_dev_seed(settings.seed_dev_data);
    if let Some(database_url) = settings.database_url.as_deref() {
        run_pending_migrations(database_url)
            .await
            .map_err(std::io::Error::other)?;
        let pool = DbPool::new(
            PoolConfig::new(database_url).with_max_size(settings.pool_max_size()),
        )
        .await
        .map_err(std::io::Error::other)?;
        config = config.with_db_pool(pool);
    }

    info!(addr = %config.bind_addr(), "starting bookshelf server");
    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config).await?;
    server.await
}
