//! # matgen: material image generation service
//!
//! `matgen` exposes a single endpoint that turns a text prompt, plus optional reference images,
//! into a generated image stored under a project and returns a public reference to it.
//!
//! ## Request Flow
//!
//! `POST /api/projects/{project_id}/materials/generate` accepts either a JSON body or a multipart
//! form. Then:
//!
//! 1. A transaction is opened and the project is looked up ([`db`]); unknown projects are 404
//!    and the body is never read.
//! 2. The body is extracted as a [`api::models::materials::GenerationBody`] and validated into a
//!    [`api::models::materials::GenerationRequest`]; an empty prompt or malformed body is 400.
//! 3. The [`generation::GenerationOrchestrator`] creates a request-scoped
//!    [`generation::Workspace`], writes any reference images into it, and calls the
//!    [`synthesis::ImageSynthesizer`]. The workspace is removed before the orchestrator returns.
//! 4. The [`generation::MaterialPersister`] stores the image via [`storage::MaterialStorage`] and
//!    derives its URL.
//! 5. The transaction commits on success and rolls back on any failure.
//!
//! Synthesis and storage failures, and anything unexpected, are reported as 503 with the
//! underlying message (see [`errors`]).
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use matgen::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = matgen::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     matgen::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
mod openapi;
pub mod storage;
pub mod synthesis;
pub mod telemetry;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use db::handlers::{PgProjectStore, ProjectStore};
use generation::{GenerationOrchestrator, GenerationSettings, MaterialPersister};
use std::sync::Arc;
use storage::LocalMaterialStorage;
use synthesis::GeminiImageSynthesizer;
use tokio::net::TcpListener;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub projects: Arc<dyn ProjectStore>,
    pub generator: Arc<GenerationOrchestrator>,
    pub persister: MaterialPersister,
}

/// Get the matgen database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Install the process-wide rustls crypto provider used by outbound HTTPS clients.
/// Calling it again once a provider is installed is a no-op.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/projects/{project_id}/materials/generate",
            post(api::handlers::materials::generate_material_image),
        )
        .layer(DefaultBodyLimit::max(state.config.max_upload_size))
        .with_state(state.clone());

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .nest_service("/files", ServeDir::new(&state.config.upload_folder))
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance: connect to the database, run migrations, and wire the
    /// synthesis and storage capabilities into the router.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting matgen with configuration: {:#?}", config);

        let pool = db::setup_database(&config.database).await?;
        let synthesizer = Arc::new(GeminiImageSynthesizer::new(&config.ai)?);
        let storage = Arc::new(LocalMaterialStorage::new(
            config.upload_folder.clone(),
            config.public_base_url.clone(),
        ));

        let state = AppState::builder()
            .config(config.clone())
            .projects(Arc::new(PgProjectStore::new(pool)))
            .generator(Arc::new(GenerationOrchestrator::new(
                synthesizer,
                GenerationSettings::from_config(&config),
            )))
            .persister(MaterialPersister::new(storage))
            .build();

        Ok(Self {
            router: build_router(state),
            config,
        })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("matgen listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        telemetry::shutdown_telemetry();
        Ok(())
    }
}
