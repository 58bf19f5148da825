// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, startup, and reload of persisted Activities.

mod reload;

pub use reload::load_persisted;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use am_core::SystemClock;

use crate::adapters::{
    FileStore, NoopCallbackSink, NoopContainerSink, NoopPowerAdapter, NoopTriggerSource,
    PersistStore,
};
use crate::config::{ActivitydConfig, ConfigError};
use crate::engine::effect::Fx;
use crate::engine::executor::EngineDeps;
use crate::engine::{Engine, EngineHandle};
use crate::model::{ENABLE_EXTERNAL, ENABLE_UI};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no usable state directory")]
    NoStateDir,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved filesystem layout.
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub store_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir().ok_or(LifecycleError::NoStateDir)?;
        Ok(Self {
            socket_path: state_dir.join("activityd.sock"),
            store_dir: state_dir.join("store"),
            log_dir: state_dir.join("logs"),
            state_dir,
        })
    }
}

/// Everything main needs to run: the engine (not yet spawned), its handle,
/// and the resolved config.
pub struct DaemonState {
    pub engine: Engine<SystemClock>,
    pub handle: EngineHandle,
    pub config: ActivitydConfig,
    pub paths: Paths,
    pub store: Arc<dyn PersistStore>,
}

/// Requirement names the stock daemon registers at startup.
///
/// The real providers (connectivity, charger, boot status) live behind the
/// bus; until one reports, a requirement holds its initial value.
fn register_default_requirements(engine: &mut Engine<SystemClock>) {
    let reqs = engine.state_mut();
    reqs.requirements.register("internet", serde_json::json!(false));
    reqs.requirements.register("charging", serde_json::json!(false));
    reqs.requirements.register("booted", serde_json::json!(true));
}

/// Build the engine, reload persisted Activities, and open the gates.
pub async fn startup(paths: Paths) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;
    let config = ActivitydConfig::load(&paths.state_dir)?;

    let store: Arc<dyn PersistStore> = Arc::new(FileStore::new(paths.store_dir.clone())?);
    let deps = EngineDeps {
        power: Arc::new(NoopPowerAdapter),
        store: Arc::clone(&store),
        triggers: Arc::new(NoopTriggerSource),
        callbacks: Arc::new(NoopCallbackSink),
        containers: Arc::new(NoopContainerSink),
    };
    let (mut engine, handle) = Engine::new(deps, config.engine_config(), SystemClock);

    register_default_requirements(&mut engine);

    // Reload before the gates open so restored Activities park in the
    // initialized queue and drain in FIFO order.
    let docs = match store.load_all().await {
        Ok(docs) => docs,
        Err(err) => {
            tracing::error!(error = %err, "failed to enumerate persisted activities");
            Vec::new()
        }
    };
    let now = chrono::Utc::now();
    let mut fx = Fx::new();
    let purge = load_persisted(engine.state_mut(), docs, now, &mut fx);
    for doc_id in purge {
        if let Err(err) = store.del(doc_id.clone(), None).await {
            tracing::warn!(doc_id = %doc_id, error = %err, "failed to purge stale document");
        }
    }

    let mut mask = crate::model::ENABLE_CONFIGURATION_LOADED | ENABLE_UI;
    if config.external_enabled {
        mask |= ENABLE_EXTERNAL;
    }
    engine.state_mut().enable(mask, now, &mut fx);

    // Effects accumulated during reload run once the loop starts; push them
    // through the engine's own dispatch by replaying as a no-op message.
    let startup_effects = fx.drain();
    if !startup_effects.is_empty() {
        engine.flush_startup_effects(startup_effects).await;
    }

    info!(
        activities = engine.state().registry.len(),
        socket = %paths.socket_path.display(),
        "activity manager ready"
    );
    Ok(DaemonState { engine, handle, config, paths, store })
}
