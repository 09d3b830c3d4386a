/// Read path: `peek_ret_id()`, `read()`, `element_count()`.
///
/// Reads share the data lock with appends: the file has one cursor, and a
/// seek followed by a decode must not interleave with another seek.
use std::io::{BufReader, Seek, SeekFrom};
use tracing::debug;

use crate::error::fs_context;
use crate::{Codec, DataPath, RecordStore, Result, StoreError};

impl<T, C: Codec<T>> RecordStore<T, C> {
    /// Returns the most recently generated stream id.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoRetIdGenerated`] if no id has ever been generated
    /// (recovered counters count), [`StoreError::Destroyed`] after a nuke.
    pub fn peek_ret_id(&self) -> Result<u64> {
        let ids = self.ids.lock();
        if ids.nuked {
            return Err(StoreError::Destroyed);
        }
        ids.next.checked_sub(1).ok_or(StoreError::NoRetIdGenerated)
    }

    /// Decodes element `index` of `stream`.
    ///
    /// Bounds are checked against the offset index before any file I/O, so
    /// an out-of-range read never touches the data file. Reads do not move
    /// the write cursor and may be issued in any order.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Destroyed`] after a nuke.
    /// - [`StoreError::UnknownStream`] if `stream` was never generated.
    /// - [`StoreError::IndexOutOfRange`] if `index >= element_count(stream)`.
    /// - [`StoreError::Filesystem`] if the seek fails.
    /// - [`StoreError::Codec`] if the bytes at the offset do not decode.
    pub fn read(&self, stream: u64, index: usize) -> Result<T> {
        let mut guard = self.data.lock();
        let data = &mut *guard;
        if data.file.is_none() {
            return Err(StoreError::Destroyed);
        }

        let offset = match data.index.get(stream, index) {
            Some(offset) => offset,
            None => return Err(self.missing_element(data, stream, index)),
        };

        let file = data.file.as_mut().ok_or(StoreError::Destroyed)?;
        file.seek(SeekFrom::Start(offset))
            .map_err(fs_context(format!("failed to seek data file to {}", offset)))?;
        let value = self.codec.decode(&mut BufReader::new(file))?;

        if self.config.debug {
            debug!(store = %self.config.name, stream, index, offset, "read record");
        }
        Ok(value)
    }

    /// Number of elements appended to `stream` so far.
    ///
    /// A generated stream with no appends reports 0. After a nuke every
    /// stream reports 0.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownStream`] if `stream` was never generated.
    pub fn element_count(&self, stream: u64) -> Result<usize> {
        let data = self.data.lock();
        if data.file.is_none() {
            return Ok(0);
        }
        let count = data.index.count(stream);
        if count == 0 && stream >= self.ids.lock().next {
            return Err(StoreError::UnknownStream(stream));
        }
        Ok(count)
    }

    fn missing_element(&self, data: &DataPath, stream: u64, index: usize) -> StoreError {
        if !data.index.contains(stream) && stream >= self.ids.lock().next {
            return StoreError::UnknownStream(stream);
        }
        StoreError::IndexOutOfRange {
            stream,
            index,
            count: data.index.count(stream),
        }
    }
}
