use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{AppointmentState, AppointmentStore, InMemoryStore, SupabaseStore};
use reminder_cell::{ChannelNotifier, Notifier, ReminderSchedule, ReminderScheduler};
use shared_config::AppConfig;
use shared_database::SupabaseClient;

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

    info!("Starting MediConnect API server");

    let config = Arc::new(AppConfig::from_env());

    let store: Arc<dyn AppointmentStore> = if config.is_configured() {
        info!("Using Supabase storage at {}", config.supabase_url);
        Arc::new(SupabaseStore::new(Arc::new(SupabaseClient::new(&config))))
    } else {
        warn!("Using in-memory storage; data is lost on restart");
        Arc::new(memory_store(&config).await?)
    };

    // Reminder sweep runs on its own task, off the request path
    let schedule = ReminderSchedule::from_config(&config).context("invalid reminder schedule")?;
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::from_config(&config));
    let scheduler = Arc::new(ReminderScheduler::new(Arc::clone(&store), notifier, schedule));
    let _reminders = scheduler.spawn();

    let appointments = Arc::new(AppointmentState::new(Arc::clone(&config), store));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(appointments)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

/// In-memory store for local runs. Providers come from `PROVIDER_SEED_PATH`;
/// without it the store is empty and every booking fails with an unknown provider.
async fn memory_store(config: &AppConfig) -> anyhow::Result<InMemoryStore> {
    let Some(path) = config.provider_seed_path.as_deref() else {
        warn!("PROVIDER_SEED_PATH not set; no providers exist, bookings will be rejected");
        return Ok(InMemoryStore::new());
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read provider seed {}", path))?;
    let store = InMemoryStore::from_provider_json(&json)
        .await
        .with_context(|| format!("failed to load provider seed {}", path))?;
    info!("Loaded providers from {}", path);
    Ok(store)
}
