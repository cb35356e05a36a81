use geosocial_api::{
    AppState,
    auth::SessionIssuer,
    config::{AppConfig, Env},
    create_router, mailer,
    network::{FixedResolver, HostResolver, ProbeResolver, ServerInfo},
    repository::{MemoryRepository, PostgresRepository, RepositoryState},
    storage::{LocalDiskStorage, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, persistence, storage, mail, host resolution,
/// then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and request summaries from tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "geosocial_api=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            // LOCAL: pretty output for humans.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // PROD: JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Persistence: Postgres when DATABASE_URL is set, in-memory otherwise.
    let repo: RepositoryState = match config.db_url.as_deref() {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let postgres = PostgresRepository::new(pool);
            postgres
                .migrate()
                .await
                .expect("FATAL: Database migrations failed.");
            Arc::new(postgres)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory repository");
            Arc::new(MemoryRepository::new())
        }
    };

    // 5. Storage: uploads live under STORAGE_ROOT.
    let storage = Arc::new(LocalDiskStorage::new(config.storage_root.clone())) as StorageState;

    // 6. Mail transport and host resolution.
    let mailer = mailer::from_config(&config);
    let resolver: Box<dyn HostResolver> = match &config.server_host {
        Some(host) => Box::new(FixedResolver(host.clone())),
        None => Box::new(ProbeResolver::default()),
    };
    let server = Arc::new(ServerInfo::resolve(resolver.as_ref(), config.port));

    // 7. Unified State Assembly
    let port = config.port;
    let app_state = AppState {
        repo,
        storage,
        mailer,
        sessions: SessionIssuer::from_config(&config),
        server: server.clone(),
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("FATAL: Could not bind the HTTP listener.");

    tracing::info!("Listening on {}", addr);
    tracing::info!("Media base URL: {}", server.base_url);
    tracing::info!("API Documentation (Swagger UI) available at: {}/swagger-ui", server.base_url);

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
