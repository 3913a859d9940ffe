// web-server/src/main.rs
use actix::Actor;
use actix_web::{web, App, HttpServer};
use common::{setup_tracing, Config};
use decentfont_web_server::api;
use decentfont_web_server::client_registry::ClientRegistryActor;
use decentfont_web_server::context::ContextBuilder;
use decentfont_web_server::static_files::{self, StaticFilesConfig};
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Setup tracing
    setup_tracing().map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    // Load configuration
    let config = Config::from_env();
    tracing::info!(
        "Network: {}, replica: {}, backend canister: {}",
        config.network,
        config.replica_endpoint(),
        config.canisters.backend
    );

    let builder = ContextBuilder::from_config(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let registry = ClientRegistryActor::new(builder)
        .with_ttl(config.session.ttl_seconds)
        .with_cleanup_interval(config.session.cleanup_interval_seconds)
        .start();

    // Save what the factory closure needs before moving config into web::Data
    let server_addr = config.web_server_addr.clone();
    let static_config = StaticFilesConfig::from(&config.static_files);

    tracing::info!("Starting Web Server on {}", server_addr);

    let config_data = web::Data::new(config);
    let registry_data = web::Data::new(registry);

    HttpServer::new(move || {
        let static_config = static_config.clone();
        App::new()
            .app_data(config_data.clone())
            .app_data(registry_data.clone())
            .configure(api::configure)
            .configure(move |cfg| static_files::configure(cfg, static_config))
    })
    .bind(&server_addr)?
    .run()
    .await
}
