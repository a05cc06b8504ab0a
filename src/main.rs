use anyhow::Result;
use axum::Router;
use image_pipeline::app;
use image_pipeline::config::AppConfig;
use image_pipeline::routes::routes::routes;
use image_pipeline::services::catalog_service::CatalogService;
use image_pipeline::services::mailer::LogMailer;
use image_pipeline::services::object_store::HttpObjectStore;
use sqlx::sqlite::SqlitePoolOptions;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;
    tracing::info!("Starting image-pipeline with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");

    // Create parent directory and database file if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(db_path)?;

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?,
    );

    // --- Catalog store + schema ---
    let catalog = CatalogService::new(db);
    catalog.apply_schema().await?;

    // --- Collaborator clients, one per process ---
    let store = Arc::new(HttpObjectStore::new(cfg.object_store_url.clone())?);
    let mailer = Arc::new(LogMailer);

    // --- Assemble the event graph and start its consumers ---
    let pipeline = Arc::new(app::build(
        catalog,
        store,
        mailer,
        &cfg.pipeline_settings(),
    ));

    // --- Build router ---
    let app: Router = routes().with_state(pipeline);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
