use std::path::{Path, PathBuf};

use crate::config::{Config, NotifyMode};
use crate::notify::{NoopNotifier, Notifier, OutboxNotifier};
use crate::store::{open_store, BackendKind, Store, StoreError};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub store: Option<Box<dyn Store>>,
    pub notifier: Box<dyn Notifier>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            config,
            workspace: None,
            store: None,
            notifier: Box::new(NoopNotifier),
        }
    }

    /// Open (or create) the store under `path`. The previous workspace stays
    /// selected if this fails.
    pub fn open_workspace(&mut self, path: &Path, backend: BackendKind) -> Result<(), StoreError> {
        let store = open_store(backend, path)?;
        self.notifier = match self.config.notify {
            NotifyMode::Outbox => Box::new(OutboxNotifier::new(
                path.to_path_buf(),
                self.config.admin_email.clone(),
            )),
            NotifyMode::Off => Box::new(NoopNotifier),
        };
        self.store = Some(store);
        self.workspace = Some(path.to_path_buf());
        tracing::info!(workspace = %path.display(), backend = backend.as_str(), "workspace opened");
        Ok(())
    }
}
