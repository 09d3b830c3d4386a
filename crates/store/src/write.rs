/// Write path: `generate_ret_id()`, `append()`, `checkpoint()`.
///
/// Every append encodes the record into a scratch buffer first, then writes
/// it in one `write_all` at the shared cursor. A failed encode writes
/// nothing; a failed write leaves the cursor and index untouched, so any
/// partial bytes are overwritten by the next append.
use std::io::{Seek, SeekFrom, Write};
use tracing::debug;

use crate::error::fs_context;
use crate::{Codec, CodecError, RecordStore, Result, StoreError};

impl<T, C: Codec<T>> RecordStore<T, C> {
    /// Returns the next unused stream id and advances the counter.
    ///
    /// Ids start at 0 and are never reused, including across recovery (the
    /// counter is part of the sidecar). Only the ids lock is taken.
    pub fn generate_ret_id(&self) -> Result<u64> {
        let mut ids = self.ids.lock();
        if ids.nuked {
            return Err(StoreError::Destroyed);
        }
        let id = ids.next;
        ids.next = id.checked_add(1).ok_or(StoreError::RetIdExhausted)?;
        Ok(id)
    }

    /// Appends `record` to `stream` and returns its element index.
    ///
    /// The record is written at the current end of data and its offset pushed
    /// onto the stream's offset list. Appends to any stream are serialized
    /// with every other append and read.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Destroyed`] after a nuke.
    /// - [`StoreError::UnknownStream`] if `stream` was never generated.
    /// - [`StoreError::Codec`] if encoding fails or yields no bytes.
    /// - [`StoreError::Filesystem`] if the seek or write fails.
    pub fn append(&self, stream: u64, record: &T) -> Result<usize> {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        let file = data.file.as_mut().ok_or(StoreError::Destroyed)?;

        if stream >= self.ids.lock().next {
            return Err(StoreError::UnknownStream(stream));
        }

        data.scratch.clear();
        self.codec.encode(record, &mut data.scratch)?;
        if data.scratch.is_empty() {
            // two elements would share one offset
            return Err(CodecError::Serialize("codec produced an empty encoding".to_string()).into());
        }

        let offset = data.cursor;
        file.seek(SeekFrom::Start(offset))
            .map_err(fs_context(format!("failed to seek data file to {}", offset)))?;
        file.write_all(&data.scratch)
            .map_err(fs_context(format!("failed to append {} bytes at {}", data.scratch.len(), offset)))?;

        data.cursor = offset + data.scratch.len() as u64;
        let index = data.index.push(stream, offset);

        if self.config.debug {
            debug!(
                store = %self.config.name,
                stream,
                index,
                offset,
                len = data.scratch.len(),
                "appended record"
            );
        }
        Ok(index)
    }

    /// Writes the current index and counters to the sidecar now, instead of
    /// waiting for drop.
    ///
    /// # Errors
    ///
    /// [`StoreError::Destroyed`] after a nuke; otherwise any sync or sidecar
    /// write failure.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_nuked() {
            return Err(StoreError::Destroyed);
        }
        self.persist()
    }
}
