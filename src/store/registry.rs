use super::project_store::ProjectStore;
use crate::adapters::{message_adapter_for, translation_adapter_for};
use crate::error::LyraError;
use crate::lyra_config::ProjectConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug)]
struct Entry {
    /// Config the store's adapters were built from. `None` for stores
    /// added directly.
    config: Option<ProjectConfig>,
    store: Arc<ProjectStore>,
}

/// One `ProjectStore` per project directory, kept for the life of the
/// process so parsed project files are only read once.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: Mutex<HashMap<PathBuf, Entry>>,
}

fn normalize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    // Component-wise rebuild drops trailing separators and `.` parts
    absolute.components().collect()
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn stores(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Entry>> {
        self.stores.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn has_project_store(&self, path: &Path) -> bool {
        self.stores().contains_key(&normalize(path))
    }

    pub fn add_project_store(&self, path: &Path, store: Arc<ProjectStore>) {
        self.stores()
            .insert(normalize(path), Entry { config: None, store });
    }

    pub fn project_store(&self, path: &Path) -> Result<Arc<ProjectStore>, LyraError> {
        self.stores()
            .get(&normalize(path))
            .map(|entry| Arc::clone(&entry.store))
            .ok_or_else(|| LyraError::StoreNotFound(path.to_path_buf()))
    }

    /// The store for a project, created with adapters matching its config
    /// on first use. Repeated calls with the same config return the same
    /// instance.
    ///
    /// A store built from a different config is replaced. The replacement
    /// keeps the old store's unsent edits.
    pub fn get_or_create(&self, config: &ProjectConfig) -> Arc<ProjectStore> {
        let path = normalize(&config.root);
        let mut stores = self.stores();

        if let Some(entry) = stores.get(&path) {
            if entry.config.as_ref().map_or(true, |c| c == config) {
                return Arc::clone(&entry.store);
            }
        }

        let store = match stores.remove(&path) {
            Some(previous) => {
                info!("Project config changed, rebuilding store for {}", path.display());
                ProjectStore::replacing(
                    message_adapter_for(config),
                    translation_adapter_for(config),
                    previous.store,
                )
            }
            None => {
                info!("Creating project store for {}", path.display());
                ProjectStore::new(message_adapter_for(config), translation_adapter_for(config))
            }
        };
        let store = Arc::new(store);
        stores.insert(
            path,
            Entry {
                config: Some(config.clone()),
                store: Arc::clone(&store),
            },
        );
        store
    }
}
