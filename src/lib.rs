pub mod audio;
pub mod commands;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod settings;
pub mod stats;
pub mod store;
pub mod timer;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use audio::{
    assets::{CueLibrary, FsAssetLoader},
    AudioEngineHandle, CuePlayer,
};
use db::Database;
use identity::{IdentityProvider, LocalIdentity};
use log::{info, warn};
use settings::SettingsStore;
use stats::StatsFeed;
use store::SessionStore;
use timer::{SessionController, TimerEvent};
use tokio::sync::broadcast;

pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn SessionStore>,
    pub timer: SessionController,
    pub settings: SettingsStore,
    pub stats: StatsFeed,
}

fn init_logging() {
    let default_level = if settings::debug_enabled() {
        "debug"
    } else {
        "info"
    };
    // RUST_LOG wins when set.
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_level),
    )
    .try_init();
}

pub fn build_app() -> Result<AppState> {
    let data_dir = settings::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let user_settings = settings.get();

    let database = Database::new(data_dir.join("zendo.sqlite3"))?;

    let library = CueLibrary::load(&FsAssetLoader::new(settings.assets_dir(&data_dir)));
    let audio = Arc::new(AudioEngineHandle::new(library, user_settings.bells.volume));
    let cues = CuePlayer::new(audio).with_enabled(user_settings.bells.enabled);

    let identity: Arc<dyn IdentityProvider> = Arc::new(LocalIdentity::new(database.clone()));
    let store: Arc<dyn SessionStore> = Arc::new(database);

    let timer = SessionController::new(
        identity.clone(),
        store.clone(),
        cues,
        user_settings.default_duration_minutes,
    );
    let stats = StatsFeed::spawn(store.clone());

    Ok(AppState {
        identity,
        store,
        timer,
        settings,
        stats,
    })
}

/// Print milestones as they happen.
fn spawn_event_printer(timer: &SessionController) {
    let mut events = timer.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match event {
                TimerEvent::Interval { elapsed_secs } => {
                    println!("{} minutes in", elapsed_secs / 60);
                }
                TimerEvent::Completed { duration_minutes } => {
                    println!("{duration_minutes} minutes complete: count distractions with + / -, then commit or discard");
                }
                TimerEvent::SessionLost {
                    duration_minutes, ..
                } => {
                    println!("the {duration_minutes}-minute session was not saved");
                }
                _ => {}
            }
        }
    });
}

/// Reload history whenever someone signs in or out.
fn spawn_history_sync(app: &AppState) {
    let mut users = app.identity.subscribe();
    let timer = app.timer.clone();
    tokio::spawn(async move {
        while users.changed().await.is_ok() {
            if let Err(err) = timer.refresh_history().await {
                warn!("Failed to load session history: {err:#}");
            }
        }
    });
}

pub async fn run() -> Result<()> {
    init_logging();
    info!("Zendo starting up...");

    let app = build_app()?;
    spawn_event_printer(&app.timer);
    spawn_history_sync(&app);

    commands::repl(&app).await?;

    info!("Zendo shutting down");
    Ok(())
}
