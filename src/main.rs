use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use mongodb::Client;
use tracing_subscriber::EnvFilter;

use groupsplit::config::Config;
use groupsplit::routes;
use groupsplit::store::{GroupStore, MongoGroupStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!("Using database {}", config.database_name);

    let client = match Client::with_uri_str(&config.mongodb_uri).await {
        Ok(client) => client,
        Err(err) => {
            tracing::error!("Failed to connect to MongoDB: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!("Connected");

    let store = MongoGroupStore::new(&client, &config.database_name);
    if let Err(err) = store.ensure_indexes().await {
        tracing::error!("Failed to create the group indexes: {err}");
        std::process::exit(1);
    }
    let store: Arc<dyn GroupStore> = Arc::new(store);
    let store = web::Data::from(store);
    let address = (config.bind_address.clone(), config.port);
    let config = web::Data::new(config);

    tracing::info!("Listening on {}:{}", address.0, address.1);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .app_data(config.clone())
            .app_data(store.clone())
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await
}
