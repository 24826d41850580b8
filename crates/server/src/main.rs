//! osccai server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use osccai_api::{AppState, HeaderSessions, NoSessions, SessionResolver, app};
use osccai_common::Config;
use osccai_core::{
    ApiKeyService, ConstitutionService, EventService, ParticipantService, PollService,
    ScoringClient, ScoringService, TallyEngine, WebhookService, WebhookVerifier,
};
use osccai_db::repositories::{
    ApiKeyRepository, CommunityModelRepository, ConstitutionRepository, ParticipantRepository,
    PollRepository, StatementRepository, SystemEventRepository, VoteRepository,
};
use osccai_queue::{SchedulerConfig, SchedulerState, run_scheduler};
use tokio::{
    signal,
    sync::{RwLock, watch},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osccai=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting osccai server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(osccai_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    osccai_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let statement_repo = StatementRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let model_repo = CommunityModelRepository::new(Arc::clone(&db));
    let participant_repo = ParticipantRepository::new(Arc::clone(&db));
    let api_key_repo = ApiKeyRepository::new(Arc::clone(&db));
    let constitution_repo = ConstitutionRepository::new(Arc::clone(&db));
    let event_repo = SystemEventRepository::new(Arc::clone(&db));

    // Initialize services
    let event_service = EventService::new(event_repo, model_repo.clone());
    let participant_service = ParticipantService::new(participant_repo);
    let poll_service = PollService::new(
        poll_repo.clone(),
        statement_repo.clone(),
        vote_repo,
        model_repo.clone(),
        participant_service.clone(),
        TallyEngine::new(Arc::clone(&db)),
        event_service.clone(),
    );
    let constitution_service = ConstitutionService::new(
        Arc::clone(&db),
        constitution_repo,
        poll_repo.clone(),
        statement_repo.clone(),
        event_service.clone(),
    );
    let webhook_service = WebhookService::new(
        WebhookVerifier::from_config(&config.webhook),
        constitution_service.clone(),
        poll_repo.clone(),
        statement_repo,
        event_service.clone(),
    );

    let scoring_client = ScoringClient::from_config(&config.consensus)?;
    if config.consensus.service_url.is_none() {
        tracing::warn!("Scoring service URL not configured, recalculation requests will fail");
    }
    let scoring_service = ScoringService::new(Arc::new(scoring_client), poll_repo);

    let sessions: Arc<dyn SessionResolver> = match config.auth.session_header.as_deref() {
        Some(header) => {
            info!(header, "First-party sessions enabled");
            Arc::new(HeaderSessions::new(header)?)
        }
        None => Arc::new(NoSessions),
    };

    let state = AppState {
        poll_service,
        participant_service,
        api_key_service: ApiKeyService::new(api_key_repo, model_repo, event_service.clone()),
        constitution_service,
        scoring_service: scoring_service.clone(),
        webhook_service,
        event_service,
        sessions,
        cron_secret: config.auth.cron_secret.clone(),
        admin_token: config.auth.admin_token.clone(),
    };

    // Build router
    let router = app(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start the recalculation scheduler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = run_scheduler(
        SchedulerConfig::from(&config.consensus),
        Arc::new(scoring_service),
        Arc::new(RwLock::new(SchedulerState::default())),
        shutdown_rx,
    );

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::new(host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    info!("Server shutdown complete");
    Ok(())
}
