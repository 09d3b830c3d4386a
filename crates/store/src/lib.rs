//! # Store - Multiplexed Append-Only Record Store
//!
//! One binary data file carries many independent logical streams ("retId"
//! streams). Each stream is an append-only sequence of records addressed by
//! `(stream id, element index)`. A JSON sidecar next to the data file keeps
//! the per-stream offset tables so the store can be reopened without scanning
//! the data file.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────┐
//! │                    RECORD STORE                      │
//! │                                                      │
//! │ ids lock ──► generate_ret_id() / peek_ret_id()       │
//! │                                                      │
//! │ data lock ─► append(): codec.encode → write @ cursor │
//! │              |          → OffsetIndex.push           │
//! │              read():   OffsetIndex.get → seek        │
//! │                         → codec.decode               │
//! │                                                      │
//! │ open/drop/checkpoint ─► Snapshot (sidecar JSON)      │
//! └──────────────────────────────────────────────────────┘
//!            |                          |
//!            v                          v
//!      <name>.bin                  <name>.json
//!  (encoded records, no framing)  (meta + offsets)
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                  |
//! |--------------|----------------------------------------------------------|
//! | [`lib.rs`]   | `RecordStore` struct, accessors, `Debug`, `Drop`          |
//! | [`recovery`] | `open()`: fresh creation or sidecar recovery + validation |
//! | [`write`]    | `generate_ret_id()`, `append()`, `checkpoint()`           |
//! | [`read`]     | `peek_ret_id()`, `read()`, `element_count()`              |
//! | [`nuke`]     | `nuke()`: delete the file pair, reset in-memory state     |
//! | [`error`]    | `StoreError` and `ErrorKind`                              |
//!
//! ## Locking
//!
//! Two independent `parking_lot` mutexes:
//!
//! - the **data lock** guards the file handle, the write cursor and the
//!   offset index. Every append, read, count and nuke holds it for one
//!   encode+write or one seek+decode, so data-path operations across all
//!   streams are strictly serialized;
//! - the **ids lock** guards only the stream id counter.
//!
//! Lock order is always data → ids. Id generation never touches the data lock.
//!
//! ## Durability
//!
//! The sidecar is written on creation, on [`RecordStore::checkpoint`] and on
//! drop. An abnormal exit loses the index entries of every append since the
//! last of those, even though the bytes are in the data file; on the next
//! recovery the data file is truncated back to the recorded cursor.
mod error;
mod nuke;
mod read;
mod recovery;
mod write;

pub use codec::{BincodeCodec, ChecksumCodec, Codec, CodecError};
pub use config::StoreConfig;
pub use error::{ErrorKind, Result, StoreError};

use offsets::OffsetIndex;
use parking_lot::Mutex;
use sidecar::Snapshot;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use error::fs_context;

/// File handle, write cursor and offset index. Guarded by the data lock.
pub(crate) struct DataPath {
    /// `None` once the store has been nuked.
    pub(crate) file: Option<File>,
    pub(crate) index: OffsetIndex,
    /// Byte position where the next record is written.
    pub(crate) cursor: u64,
    /// Reusable encode buffer.
    pub(crate) scratch: Vec<u8>,
}

/// Stream id counter. Guarded by the ids lock.
pub(crate) struct RetIds {
    pub(crate) next: u64,
    pub(crate) nuked: bool,
}

/// A file-backed store of many append-only record streams.
///
/// `T` is the record type and `C` the codec that turns it into bytes. All
/// operations take `&self`; wrap the store in an `Arc` to share it between
/// threads.
///
/// # Lifecycle
///
/// `open` → active → (optional) `nuke`. After a nuke every data operation
/// returns [`StoreError::Destroyed`], `element_count` reports 0, and drop no
/// longer writes the sidecar.
pub struct RecordStore<T, C> {
    pub(crate) config: StoreConfig,
    pub(crate) data_path: PathBuf,
    pub(crate) sidecar_path: PathBuf,
    pub(crate) codec: C,
    pub(crate) data: Mutex<DataPath>,
    pub(crate) ids: Mutex<RetIds>,
    _record: PhantomData<fn() -> T>,
}

impl<T, C> std::fmt::Debug for RecordStore<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.lock();
        let ids = self.ids.lock();
        f.debug_struct("RecordStore")
            .field("name", &self.config.name)
            .field("data_path", &self.data_path)
            .field("sidecar_path", &self.sidecar_path)
            .field("write_cursor", &data.cursor)
            .field("next_ret_id", &ids.next)
            .field("stream_count", &data.index.stream_count())
            .field("total_elements", &data.index.total_elements())
            .field("nuked", &ids.nuked)
            .field("debug", &self.config.debug)
            .finish()
    }
}

impl<T, C> RecordStore<T, C> {
    pub(crate) fn from_parts(
        config: StoreConfig,
        codec: C,
        file: File,
        snapshot: Snapshot,
    ) -> Self {
        let index = snapshot.to_index();
        Self {
            data_path: config.data_path(),
            sidecar_path: config.sidecar_path(),
            config,
            codec,
            data: Mutex::new(DataPath {
                file: Some(file),
                index,
                cursor: snapshot.meta.file_offset,
                scratch: Vec::with_capacity(256),
            }),
            ids: Mutex::new(RetIds {
                next: snapshot.meta.ret_id,
                nuked: false,
            }),
            _record: PhantomData,
        }
    }

    /// The store name (also recorded in the sidecar).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    #[must_use]
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    #[must_use]
    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    /// Byte position where the next record will be written.
    #[must_use]
    pub fn write_cursor(&self) -> u64 {
        self.data.lock().cursor
    }

    /// Number of streams holding at least one element.
    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.data.lock().index.stream_count()
    }

    /// Number of elements across all streams.
    #[must_use]
    pub fn total_elements(&self) -> usize {
        self.data.lock().index.total_elements()
    }

    #[must_use]
    pub fn is_nuked(&self) -> bool {
        self.ids.lock().nuked
    }

    /// Syncs the data file and writes the current snapshot to the sidecar.
    /// Does nothing on a nuked store.
    pub(crate) fn persist(&self) -> Result<()> {
        let mut data = self.data.lock();
        // The data lock excludes nuke, so the flag cannot change below. Id
        // generation keeps running while the sidecar is written.
        let (nuked, next_ret_id) = {
            let ids = self.ids.lock();
            (ids.nuked, ids.next)
        };
        if nuked {
            return Ok(());
        }
        let Some(file) = data.file.as_mut() else {
            return Ok(());
        };

        // the sidecar must never point at bytes the OS has not persisted
        file.sync_data()
            .map_err(fs_context(format!("failed to sync {}", self.data_path.display())))?;

        Snapshot::capture(&self.config.name, data.cursor, next_ret_id, &data.index)
            .save(&self.sidecar_path)?;

        if self.config.debug {
            debug!(
                store = %self.config.name,
                cursor = data.cursor,
                next_ret_id,
                "wrote sidecar"
            );
        }
        Ok(())
    }
}

/// Best-effort metadata flush on drop.
///
/// Drop cannot propagate errors, so a failed save is logged and swallowed.
/// The data bytes are still in the data file, but the index entries since the
/// last successful save are lost.
impl<T, C> Drop for RecordStore<T, C> {
    fn drop(&mut self) {
        if self.ids.get_mut().nuked {
            debug!(store = %self.config.name, "store was nuked, skipping sidecar write");
            return;
        }
        if let Err(e) = self.persist() {
            warn!(store = %self.config.name, error = %e, "failed to write sidecar on drop");
        }
    }
}

#[cfg(test)]
mod tests;
