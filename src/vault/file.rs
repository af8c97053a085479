//! File-backed secret store: one file per id

use super::SecretStore;
use async_trait::async_trait;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error};
use uuid::Uuid;

/// Extension of the files holding vault blobs
pub const VAULT_EXTENSION: &str = "vault";

/// Stores each blob verbatim in `<directory>/<uuid>.vault`.
///
/// There is no locking: concurrent writes to the same id race.
pub struct FileSecretStore {
    directory: PathBuf,
}

impl FileSecretStore {
    /// Open a store rooted at `directory`, creating the directory if needed
    pub async fn open(directory: impl Into<PathBuf>) -> io::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        Ok(Self { directory })
    }

    /// Directory holding the vault files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.directory.join(format!("{}.{}", id, VAULT_EXTENSION))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn load(&self, id: Uuid) -> Option<Vec<u8>> {
        let path = self.path_for(id);
        match fs::read(&path).await {
            Ok(blob) => Some(blob),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%id, "No vault blob stored");
                None
            }
            Err(e) => {
                error!(%id, path = %path.display(), "Failed to read vault blob: {}", e);
                None
            }
        }
    }

    async fn save(&self, id: Uuid, blob: &[u8]) {
        let path = self.path_for(id);
        if let Err(e) = fs::write(&path, blob).await {
            error!(%id, path = %path.display(), "Failed to write vault blob: {}", e);
        }
    }

    async fn delete(&self, id: Uuid) {
        let path = self.path_for(id);
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%id, "No vault blob to delete");
            }
            Err(e) => {
                error!(%id, path = %path.display(), "Failed to delete vault blob: {}", e);
            }
        }
    }
}
