use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use consultation_cell::services::reminders::{
    InMemoryReminderScheduler, ReminderScheduler, SupabaseReminderScheduler,
};
use consultation_cell::store::{
    ConsultationRepository, InMemoryConsultationStore, SupabaseConsultationStore,
};
use consultation_cell::{ConsultationContext, ConsultationState, StoreMode};
use realtime_cell::RoomBroadcaster;
use shared_config::AppConfig;
use shared_database::SupabaseClient;
use video_conferencing_cell::RouterRegistry;

const ROOM_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting consultation API server");

    let config = Arc::new(AppConfig::from_env());
    let state = build_state(config.clone())?;

    spawn_room_pruner(state.broadcaster.clone());

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn build_state(config: Arc<AppConfig>) -> anyhow::Result<ConsultationState> {
    let (repository, reminders, store_mode): (
        Arc<dyn ConsultationRepository>,
        Arc<dyn ReminderScheduler>,
        StoreMode,
    ) = if config.is_configured() {
        let client = SupabaseClient::new(&config).context("invalid Supabase configuration")?;
        info!("Using Supabase consultation store at {}", client.get_base_url());
        (
            Arc::new(SupabaseConsultationStore::new(client.clone())),
            Arc::new(SupabaseReminderScheduler::new(client)),
            StoreMode::Supabase,
        )
    } else {
        warn!("Supabase not configured - consultations are kept in memory and lost on restart");
        (
            Arc::new(InMemoryConsultationStore::new()),
            Arc::new(InMemoryReminderScheduler::new()),
            StoreMode::InMemory,
        )
    };

    let registry = RouterRegistry::new(&config);
    info!("Media routers provided by {:?}", registry.provider());

    let broadcaster = RoomBroadcaster::new();
    let context = ConsultationContext::new(
        config,
        repository,
        Arc::new(registry),
        Arc::new(broadcaster.clone()),
        reminders,
    );

    Ok(ConsultationState::new(context, broadcaster, store_mode))
}

fn spawn_room_pruner(broadcaster: RoomBroadcaster) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ROOM_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let pruned = broadcaster.prune_idle_rooms().await;
            if pruned > 0 {
                debug!(
                    "Pruned {} idle rooms, {} still open",
                    pruned,
                    broadcaster.get_active_rooms().await.len()
                );
            }
        }
    });
}
