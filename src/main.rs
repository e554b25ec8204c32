//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; reminder recovery runs before the UI starts.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use swapmeet::adapters::ai::{MockAiAdapter, OpenAiAdapter};
use swapmeet::adapters::persistence::{JsonStore, MemoryStore, SqliteStore};
use swapmeet::adapters::ui::tui::TuiInputPort;
use swapmeet::ports::{AiPort, InputPort, StorePort};
use swapmeet::shared::config::{AppConfig, StoreBackend};
use swapmeet::usecases::{
    AppointmentService, ChatService, ListingService, ReminderService, RoomHub,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    swapmeet::adapters::ui::init_ui();

    let cfg = AppConfig::load().unwrap_or_default();
    let data_dir = cfg.data_dir_or_default();
    let data_path = PathBuf::from(&data_dir);
    let data_dir_abs = data_path
        .canonicalize()
        .unwrap_or_else(|_| data_path.clone());
    info!(path = %data_dir_abs.display(), "data directory");

    // --- Store (single source of truth; all services read through it) ---
    let store: Arc<dyn StorePort> = match cfg.store_backend_or_default() {
        StoreBackend::Json => {
            let json_store = JsonStore::new(data_path.join("storage.json"));
            json_store
                .load()
                .await
                .map_err(|e| anyhow::anyhow!("store load failed: {}", e))?;
            info!("JSON store loaded");
            Arc::new(json_store)
        }
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::connect(&data_path)
                .await
                .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
        ),
        StoreBackend::Memory => {
            warn!("memory store selected; nothing will survive a restart");
            Arc::new(MemoryStore::seeded())
        }
    };

    // --- Rooms + reminders; re-arm stored appointments before serving ---
    let hub = Arc::new(RoomHub::new());
    let reminders = Arc::new(ReminderService::new(Arc::clone(&hub)));
    let recovered = reminders
        .recover(store.as_ref())
        .await
        .map_err(|e| anyhow::anyhow!("reminder recovery failed: {}", e))?;
    info!(recovered, "startup recovery complete");

    // --- AI gateway (mock unless a key is configured) ---
    let ai: Arc<dyn AiPort> = if cfg.is_ai_configured() {
        info!(
            model = %cfg.ai_model_or_default(),
            url = %cfg.ai_api_url_or_default(),
            "AI listing copy enabled with OpenAI adapter"
        );
        Arc::new(OpenAiAdapter::new(
            cfg.ai_api_url_or_default(),
            cfg.ai_api_key().unwrap_or_default(),
            cfg.ai_model_or_default(),
        ))
    } else {
        warn!("SWAPMEET_AI_API_KEY not set, using mock AI adapter");
        Arc::new(MockAiAdapter::new())
    };

    // --- Services ---
    let chat = Arc::new(ChatService::new(Arc::clone(&store), Arc::clone(&hub)));
    let appointments = Arc::new(AppointmentService::new(
        Arc::clone(&store),
        Arc::clone(&reminders),
        Arc::clone(&hub),
    ));
    let listings = Arc::new(ListingService::new(
        Arc::clone(&store),
        ai,
        Arc::clone(&chat),
    ));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        Arc::clone(&store),
        listings,
        appointments,
        chat,
    ));

    // --- Run (profile -> browse/create -> rooms) ---
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
