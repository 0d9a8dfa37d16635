use crate::{
    config::{StorageDriver, UploadsConfig},
    uploads::UploadsManager,
};
use axum::{http::Method, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use self::admin::admin_router;

mod admin;

pub fn router(uploads: UploadsManager, config: &UploadsConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE]);

    public_router(config)
        .merge(admin_router(uploads))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves the local disk under the web path so published URLs resolve.
/// Other disks, and web paths pointing elsewhere, are published by someone else.
fn public_router(config: &UploadsConfig) -> Router {
    let router = Router::new();

    let Some(webpath) = local_webpath(&config.webpath) else {
        return router;
    };

    match (config.storage, &config.root) {
        (StorageDriver::Local, Some(root)) => {
            info!("Serving {root} at {webpath}");
            router.nest_service(&webpath, ServeDir::new(root))
        }
        _ => router,
    }
}

/// The route for a web path on this server, `None` for full URLs and the root.
fn local_webpath(webpath: &str) -> Option<String> {
    if !webpath.starts_with('/') {
        return None;
    }

    let webpath = webpath.trim_matches('/');

    (!webpath.is_empty()).then(|| format!("/{webpath}"))
}
