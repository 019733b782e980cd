use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing::{Level, debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{
    auth::Auth,
    chain::Retriever,
    config::Settings,
    llm::{LanguageModel, OpenAIModel},
    pipeline::Pipeline,
    repository, routes,
    storage::Storage,
    vectordb::VectorDB,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub auth: Auth,
    pub vectordb: VectorDB,
    pub pipeline: Pipeline,
    pub storage: Storage,
    pub llm: Arc<dyn LanguageModel>,
    pub retriever: Arc<dyn Retriever>,
    pub retrieval_k: u64,
}

impl AppState {
    pub fn new(pool: PgPool, vectordb: VectorDB, settings: &Settings) -> Self {
        let llm = OpenAIModel::new(
            &settings.openai_api_key,
            settings.openai_model.clone(),
            settings.temperature,
        );
        Self {
            pool,
            auth: Auth::new(&settings.jwt_secret_key, settings.jwt_algorithm),
            pipeline: Pipeline::new(vectordb.clone(), settings.chunk_size, settings.chunk_overlap),
            storage: Storage::new(settings.storage_dir.clone()),
            llm: Arc::new(llm),
            retriever: Arc::new(vectordb.clone()),
            vectordb,
            retrieval_k: settings.retrieval_k,
        }
    }
}

pub fn init_tracing(log_level: Level, log_json: bool) {
    let level_filter = LevelFilter::from_level(log_level);
    let subscriber = tracing_subscriber::registry()
        .with(level_filter)
        .with((!log_json).then(|| fmt::layer().compact()))
        .with(log_json.then(|| fmt::layer().json()));
    subscriber.init();
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// All API routes, without the network-facing layers added by [`serve`].
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::users::router())
        .merge(routes::documents::router(max_upload_bytes))
        .merge(routes::chat::router())
        .with_state(state)
}

pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let pool = repository::create_pool(&settings.database).await?;
    info!("Running database migrations...");
    repository::migrate(&pool).await?;
    let vectordb = VectorDB::new(
        &settings.qdrant_url,
        settings.qdrant_api_key.clone(),
        settings.collection_name.clone(),
    )?;
    vectordb.ensure_collection().await?;
    let state = AppState::new(pool, vectordb, &settings);

    let cors_layer = CorsLayer::new()
        .allow_origin(settings.cors_origins.clone())
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request());

    let rate = settings.rate_limit_per_minute.max(1);
    let governor_conf = Box::new(
        GovernorConfigBuilder::default()
            .per_millisecond(60_000 / u64::from(rate))
            .burst_size(rate)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Could not create a rate limiter configuration"))?,
    );
    let governor_limiter = governor_conf.limiter().clone();
    let interval = Duration::from_secs(60);
    // a separate background task to clean up
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(interval);
            if !governor_limiter.is_empty() {
                debug!("rate limiting storage size: {}", governor_limiter.len());
            }
            governor_limiter.retain_recent();
        }
    });
    let governor_layer = GovernorLayer::new(governor_conf);

    let app = build_router(state, settings.max_upload_bytes)
        .layer(governor_layer)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(settings.addr).await?;
    info!("Server listening on {}", settings.addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
