use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use plaza_engine::{
    AccountId, ConfigError, CoreConfig, EntityId, LocalPlayerState, LoopConfig, Scene, Session,
    Viewport, CONFIG_ENV_VAR,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::plaza_scene::PlazaScene;
use super::profile_worker::ProfileWorker;
use super::room_layout::{LayoutError, RoomLayout};

const LOCAL_PLAYER_ID: EntityId = EntityId(1);
const LOCAL_ACCOUNT: &str = "local";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("failed to start profile worker: {0}")]
    Worker(#[source] io::Error),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) session: Session<ProfileWorker>,
    pub(crate) scene: Box<dyn Scene<ProfileWorker>>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Plaza Startup ===");

    let core = load_core_config()?;
    let layout = RoomLayout::builtin()?;
    let account = AccountId(LOCAL_ACCOUNT.to_string());
    let profile = ProfileWorker::spawn(
        Duration::from_millis(layout.economy.profile_latency_ms),
        HashMap::from([(account.clone(), layout.economy.starting_balance)]),
    )
    .map_err(BootstrapError::Worker)?;

    let config = LoopConfig::default();
    let viewport = Viewport {
        width: config.window_width,
        height: config.window_height,
    };
    let local = LocalPlayerState::new(LOCAL_PLAYER_ID, account, layout.spawn);
    let session = Session::new(core, local, viewport, profile);
    info!(room = %layout.room, nodes = layout.nodes.len(), bots = layout.bots.len(), "layout_loaded");

    Ok(AppWiring {
        config,
        session,
        scene: Box::new(PlazaScene::new(layout)),
    })
}

/// Reads the tuning file named by the environment, or falls back to the
/// built-in defaults when the variable is unset.
fn load_core_config() -> Result<CoreConfig, ConfigError> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) => {
            let path = PathBuf::from(path);
            let config = CoreConfig::load(&path)?;
            info!(path = %path.display(), "core_config_loaded");
            Ok(config)
        }
        None => Ok(CoreConfig::default()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
