pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod rally;
pub mod routes;
pub mod schema;
pub mod state;
pub mod upload;
pub mod utils;

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
