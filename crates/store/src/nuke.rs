/// Irreversible destruction of a store instance.
use sidecar::tmp_path_for;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

use crate::error::fs_context;
use crate::{RecordStore, Result};

impl<T, C> RecordStore<T, C> {
    /// Deletes the data file and the sidecar (plus any leftover sidecar tmp
    /// file) and resets all in-memory state.
    ///
    /// The instance is marked nuked before anything is deleted, so even if a
    /// deletion fails it stays terminal: later appends, reads and id
    /// operations return [`StoreError::Destroyed`](crate::StoreError::Destroyed)
    /// and drop writes no sidecar. Nuking twice is a no-op.
    ///
    /// # Errors
    ///
    /// [`StoreError::Filesystem`](crate::StoreError::Filesystem) if a file
    /// exists but cannot be removed.
    pub fn nuke(&self) -> Result<()> {
        let mut data = self.data.lock();
        {
            let mut ids = self.ids.lock();
            if ids.nuked {
                return Ok(());
            }
            ids.nuked = true;
            ids.next = 0;
        }

        // close the handle before unlinking (required on Windows)
        data.file = None;
        data.index.clear();
        data.cursor = 0;
        data.scratch = Vec::new();

        remove_if_exists(&self.data_path)?;
        remove_if_exists(&self.sidecar_path)?;
        remove_if_exists(&tmp_path_for(&self.sidecar_path))?;

        info!(store = %self.config.name, "nuked record store");
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fs_context(format!("failed to delete {}", path.display()))(e)),
    }
}
