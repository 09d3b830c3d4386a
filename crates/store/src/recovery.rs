/// Construction: fresh file pair or recovery from an existing one.
///
/// Recovery never scans the data file. The sidecar is loaded, its identity
/// (name + format tag) checked against the config, its structure validated
/// against the data file length, and the offset index rebuilt from it.
use sidecar::{tmp_path_for, Snapshot, FORMAT_TAG};
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::{info, warn};

use crate::error::fs_context;
use crate::{Codec, RecordStore, Result, StoreConfig, StoreError};

impl<T, C: Codec<T>> RecordStore<T, C> {
    /// Opens the store described by `config`, encoding records with `codec`.
    ///
    /// # Steps
    ///
    /// 1. Validate the config and create `base_dir` if it does not exist.
    /// 2. If both `<name>.bin` and `<name>.json` exist and
    ///    `recover_if_exists` is set, recover: load the sidecar, check its
    ///    name and format tag, validate it, and truncate any data written
    ///    past the recorded cursor.
    /// 3. Otherwise create a new empty data file (truncating an old one) and
    ///    write an empty sidecar.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidConfig`] for an unusable store name.
    /// - [`StoreError::ConfigMismatch`] if the sidecar belongs to a different
    ///   store or format.
    /// - [`StoreError::Metadata`] if the sidecar is malformed or inconsistent.
    /// - [`StoreError::Filesystem`] on any I/O failure.
    ///
    /// Any file opened before the failure is closed; no instance is returned.
    pub fn open(config: StoreConfig, codec: C) -> Result<Self> {
        config.validate()?;

        fs::create_dir_all(&config.base_dir).map_err(fs_context(format!(
            "failed to create base directory {}",
            config.base_dir.display()
        )))?;

        let data_path = config.data_path();
        let sidecar_path = config.sidecar_path();
        Self::cleanup_tmp_sidecar(&sidecar_path);
        let data_exists = exists(&data_path)?;
        let sidecar_exists = exists(&sidecar_path)?;

        let (file, snapshot) = if data_exists && sidecar_exists && config.recover_if_exists {
            Self::recover(&config, &data_path, &sidecar_path)?
        } else {
            Self::create(&config, &data_path, &sidecar_path)?
        };

        Ok(Self::from_parts(config, codec, file, snapshot))
    }

    fn recover(config: &StoreConfig, data_path: &Path, sidecar_path: &Path) -> Result<(File, Snapshot)> {
        let snapshot = Snapshot::load(sidecar_path)?;
        check_identity("name", &config.name, &snapshot.meta.name)?;
        check_identity("format", FORMAT_TAG, &snapshot.meta.format)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(data_path)
            .map_err(fs_context(format!("failed to open {}", data_path.display())))?;
        let data_len = file
            .metadata()
            .map_err(fs_context(format!("failed to stat {}", data_path.display())))?
            .len();

        snapshot.validate(data_len)?;

        // Bytes past the cursor were appended after the last snapshot and
        // have no index entries.
        if data_len > snapshot.meta.file_offset {
            warn!(
                store = %config.name,
                data_len,
                cursor = snapshot.meta.file_offset,
                "discarding unindexed tail of data file"
            );
            file.set_len(snapshot.meta.file_offset).map_err(fs_context(format!(
                "failed to truncate {}",
                data_path.display()
            )))?;
        }

        info!(
            store = %config.name,
            streams = snapshot.offsets.len(),
            cursor = snapshot.meta.file_offset,
            next_ret_id = snapshot.meta.ret_id,
            "recovered record store"
        );
        Ok((file, snapshot))
    }

    /// Removes a `<name>.json.tmp` left behind by an interrupted save.
    fn cleanup_tmp_sidecar(sidecar_path: &Path) {
        let tmp = tmp_path_for(sidecar_path);
        if fs::remove_file(&tmp).is_ok() {
            warn!(path = %tmp.display(), "removed leftover sidecar tmp file");
        }
    }

    fn create(config: &StoreConfig, data_path: &Path, sidecar_path: &Path) -> Result<(File, Snapshot)> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(data_path)
            .map_err(fs_context(format!("failed to create {}", data_path.display())))?;

        let snapshot = Snapshot::empty(&config.name);
        snapshot.save(sidecar_path)?;

        info!(store = %config.name, path = %data_path.display(), "created record store");
        Ok((file, snapshot))
    }
}

fn exists(path: &Path) -> Result<bool> {
    path.try_exists()
        .map_err(fs_context(format!("failed to check {}", path.display())))
}

fn check_identity(field: &'static str, expected: &str, found: &str) -> Result<()> {
    if expected != found {
        return Err(StoreError::ConfigMismatch {
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}
