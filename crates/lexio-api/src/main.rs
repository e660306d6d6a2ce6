use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lexio_api::{
    config::Config,
    middleware::logging,
    routes::{chat, health, story},
    state::AppState,
};
use lexio_coze::{CozeClient, CozeConfig, CozeGateway};
use lexio_learn::{ChatService, StoryService};
use lexio_persist::{LearnStore, PersistClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Lexio API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Initialize Coze gateway
    tracing::info!("Initializing Coze gateway");
    let coze_config = CozeConfig::new(config.coze_api_token.clone())
        .with_api_base(config.coze.api_base.clone())
        .with_chat_bot_id(config.coze.chat_bot_id.clone())
        .with_workflow_id(config.coze.workflow_id.clone())
        .with_user_prefix(config.coze.user_prefix.clone())
        .with_timeout_secs(config.coze.timeout_secs);
    let user_prefix = coze_config.user_prefix.clone();
    let gateway: Arc<dyn CozeGateway> = Arc::new(CozeClient::new(coze_config)?);

    // Initialize persistence (MongoDB)
    tracing::info!("Connecting to MongoDB");
    let store: Arc<dyn LearnStore> = Arc::new(
        PersistClient::connect(&config.mongodb_uri, &config.mongodb.database).await?,
    );
    tracing::info!("MongoDB connected");

    // Build the session-protocol services
    let stories = StoryService::new(store.clone(), gateway.clone());
    let chats = ChatService::new(store, gateway, user_prefix);

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), stories, chats));

    // Build router
    let app = build_router(state.clone());

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Word stories
        .route("/stories/generate", post(story::generate_story))
        .route("/stories/today", get(story::get_today_story))
        .route("/stories/:date", get(story::get_story_by_date))
        .route("/stories", get(story::list_stories))
        // Tutoring chat
        .route("/chats", post(chat::start_chat))
        .route("/chats/:chat_id", get(chat::get_chat))
        .route("/chats/:chat_id/messages", post(chat::send_message));

    // Build full router with middleware
    Router::new()
        .nest("/", api_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(300))) // generation can be slow
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.cors.enabled {
        let mut cors = CorsLayer::new()
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers(Any);

        if config.cors.origins.iter().any(|o| o == "*") {
            cors = cors.allow_origin(Any);
        } else {
            for origin in &config.cors.origins {
                if let Ok(parsed_origin) = origin.parse::<axum::http::HeaderValue>() {
                    cors = cors.allow_origin(parsed_origin);
                }
            }
        }

        cors
    } else {
        CorsLayer::permissive()
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
