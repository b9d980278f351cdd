//! # Mirror Backend
//!
//! Core of the Mirror personal finance app: recurring bills with per-month
//! payment status, an income profile, savings goals, and the monthly summary,
//! calendar and cash-flow forecast derived from them.
//!
//! - [`storage`]: key-value persistence of the four collections
//! - [`domain`]: the entity store, calculations, calendar and validation
//! - [`config`]: YAML settings and data directory resolution
//!
//! Frontends call [`initialize_backend`] once at startup and share the
//! returned [`AppState`].

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

pub mod config;
pub mod domain;
pub mod storage;

pub use config::MirrorConfig;
pub use domain::{CalendarService, Clock, MirrorStore, StoreError, SystemClock};
pub use storage::{FileKeyValueStore, MirrorRepository};

/// Services shared by every screen
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MirrorStore<FileKeyValueStore>>,
    pub calendar_service: CalendarService,
    /// Settings the backend was started with; screens format amounts through it
    pub config: MirrorConfig,
}

/// Open the data directory named by `config` and load the store.
pub async fn initialize_backend(config: &MirrorConfig) -> Result<AppState> {
    let data_directory = config.resolve_data_directory()?;
    info!("Using data directory {:?}", data_directory);

    let storage = FileKeyValueStore::new(data_directory.clone())
        .with_context(|| format!("Failed to open data directory {:?}", data_directory))?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = MirrorStore::load(MirrorRepository::new(storage), clock.clone()).await;
    let calendar_service = CalendarService::with_clock(clock.as_ref());

    Ok(AppState {
        store: Arc::new(store),
        calendar_service,
        config: config.clone(),
    })
}

/// Install env_logger with `level` as the default filter. `RUST_LOG` still
/// wins when set. Calling this more than once is harmless.
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}
