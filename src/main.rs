use std::sync::Arc;

use anyhow::Result;
use axum::http::Method;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use fashion_sense::api::{create_router, AppState};
use fashion_sense::attributes::Catalog;
use fashion_sense::config::AppConfig;
use fashion_sense::llm;
use fashion_sense::logger;
use fashion_sense::prompt::PromptTemplate;
use fashion_sense::rag::embeddings::EmbeddingGenerator;
use fashion_sense::rag::{RagPipeline, RetrievalSettings};
use fashion_sense::session::{SessionStore, Shell};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cfg = AppConfig::load(None)?;
    logger::init(&cfg.logging.level)?;

    tracing::info!("Loading embedding model {}", cfg.embedding.model);
    let embedding_cfg = cfg.embedding.clone();
    let embedder =
        tokio::task::spawn_blocking(move || EmbeddingGenerator::new(&embedding_cfg)).await??;

    let generator = llm::from_config(&cfg.llm)?;
    let template = PromptTemplate::load(cfg.llm.prompt_template.as_deref())?;

    let pipeline = Arc::new(RagPipeline::new(
        Arc::new(embedder),
        generator,
        template,
        cfg.index.dir.clone(),
        RetrievalSettings::from(&cfg),
    ));

    if let Err(e) = pipeline.index().await {
        tracing::warn!(
            "Index not ready ({}); run fashion-ingest to build it. Queries fail until then.",
            e
        );
    }

    let state = Arc::new(AppState {
        shell: Shell::new(pipeline, cfg.session.max_styles),
        sessions: SessionStore::new(cfg.session.idle_timeout_minutes),
        catalog: Catalog::new(cfg.session.max_styles),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = create_router(state)
        .fallback_service(ServeDir::new(&cfg.server.frontend_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let listener = tokio::net::TcpListener::bind(&cfg.server.addr).await?;
    tracing::info!("Fashion Sense listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
