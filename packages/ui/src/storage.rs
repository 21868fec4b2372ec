//! Platform key/value store for session persistence.

use std::path::PathBuf;
use std::sync::Arc;

use store::{FileStore, KeyValueStore};

/// File-backed store under `<data_dir>/imagebank/`, or the working directory when the
/// platform reports no data directory.
pub fn default_store() -> Arc<dyn KeyValueStore> {
    let base = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imagebank");
    tracing::debug!("session store at {}", base.display());
    Arc::new(FileStore::new(base))
}
