// src/main.rs

#[cfg(test)]
#[macro_use]
mod test_support;

mod app_state;
mod auth;
mod board;
mod config;
mod dashboard;
mod error;
mod members;
mod middleware;
mod models;
mod my_tasks;
mod notifications;
mod realtime;
mod routes;
mod store;
mod subtask;
mod task;
mod validation;

use std::io;
use std::sync::Arc;

use actix::Actor;
use actix_cors::Cors;
use actix_web::{http, middleware::Logger, web, App, HttpServer};
use env_logger::Env;
use log::info;

use crate::app_state::AppState;
use crate::config::{Config, StoreBackend};
use crate::middleware::Authentication;
use crate::realtime::BoardHub;
use crate::store::{MemoryStore, MongoStore, Store};

async fn open_store(config: &Config) -> io::Result<Arc<dyn Store>> {
    match config.store_backend {
        StoreBackend::Mongo => {
            let uri = config
                .mongo_uri
                .as_deref()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "MONGO_URI must be set"))?;
            let store = MongoStore::init(uri, &config.database_name)
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let store = open_store(&config).await?;
    // One hub for every board; sessions subscribe by board id.
    let hub = BoardHub::new().start();

    let bind_addr = config.bind_addr.clone();
    info!("Server running at http://{}", bind_addr);
    info!("Allowed CORS Origin: {}", config.frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Authentication::new(&config.jwt_secret))
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(web::Data::new(AppState {
                store: store.clone(),
                hub: hub.clone(),
                config: config.clone(),
            }))
            .configure(routes::configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
