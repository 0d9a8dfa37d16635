use clap::Parser;
use std::sync::Arc;
use tracing::info;

use crate::{
    config::{Config, StartArgs},
    mime::MimeTypes,
    uploads::{UploadsManager, WebPaths},
};

pub mod config;
pub mod error;
pub mod mime;
pub mod router;
pub mod storage;
pub mod uploads;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let StartArgs {
        config_path,
        address: host,
        port,
        log_level: level,
    } = StartArgs::parse();

    tracing_subscriber::fmt().with_max_level(level).init();

    let Config { url, uploads } = Config::read(config_path).expect("invalid config file");

    let url = std::env::var("APP_URL").ok().or(url);

    let disk = storage::disk(&uploads).expect("unable to open uploads disk");

    info!("Uploads stored on {:?} disk", uploads.storage);

    let manager = UploadsManager::new(
        disk,
        Arc::new(MimeTypes),
        WebPaths {
            webpath: uploads.webpath.clone(),
            url,
        },
    );

    let addr = format!("{host}:{port}");

    info!("Now listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("error while starting TCP listener");

    let router = router::router(manager, &uploads);

    axum::serve(listener, router)
        .await
        .expect("error while starting server");
}
