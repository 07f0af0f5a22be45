//! History backend selection from the `[history]` section.

use std::sync::Arc;

use tracing::info;

use agentpool_config::{ConfigError, ConfigLoader, HistoryConfig};
use agentpool_history_sqlite::SqliteHistoryStore;
use agentpool_protocols::HistoryStore;
use agentpool_runtime::{FileHistoryStore, MemoryHistoryStore};

use crate::error::SetupError;

/// Open the configured history backend. `file` and `sqlite` need a path;
/// `~` is expanded.
pub async fn open_history_store(
    config: &HistoryConfig,
) -> Result<Arc<dyn HistoryStore>, SetupError> {
    let path = || match config.path.as_deref() {
        Some(path) => Ok(ConfigLoader::expand_path(path)),
        None => Err(ConfigError::InvalidValue {
            field: "history.path".to_string(),
            message: format!("backend '{}' requires a path", config.backend),
        }),
    };

    let store: Arc<dyn HistoryStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryHistoryStore::new()),
        "file" => {
            let directory = path()?;
            std::fs::create_dir_all(&directory)?;
            Arc::new(FileHistoryStore::new(directory))
        }
        "sqlite" => Arc::new(SqliteHistoryStore::open(path()?).await?),
        other => {
            return Err(ConfigError::InvalidValue {
                field: "history.backend".to_string(),
                message: format!("expected 'memory', 'file' or 'sqlite', got '{}'", other),
            }
            .into());
        }
    };

    info!("Opened '{}' history store", store.id());
    Ok(store)
}
