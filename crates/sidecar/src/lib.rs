//! # Sidecar - Record Store Metadata
//!
//! The data file is a bare concatenation of encoded records, so it cannot be
//! scanned to find where records start. The sidecar is the only source of
//! truth for that structure: it stores every stream's offset list plus the
//! counters needed to keep appending after a restart.
//!
//! ## File Format
//!
//! Pretty-printed JSON:
//!
//! ```text
//! {
//!     "meta": {
//!         "name": "bench05",
//!         "format": "RawFmt01",
//!         "fileOffset": 4096,
//!         "retId": 3
//!     },
//!     "offsets": {
//!         "0": [0, 1024],
//!         "2": [2048]
//!     }
//! }
//! ```
//!
//! `fileOffset` is the end-of-data write cursor and `retId` the next stream id
//! to hand out. Stream ids appear as string keys (JSON object keys).
//!
//! ## Crash Safety
//!
//! [`Snapshot::save`] writes to `<path>.tmp`, fsyncs, then renames over the
//! sidecar, so a reader never sees a half-written file. Nothing ties a
//! snapshot to the data file atomically: appends made after the last save are
//! lost from the index if the process dies.

use offsets::OffsetIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Format tag written to and expected from every sidecar.
pub const FORMAT_TAG: &str = "RawFmt01";

/// Errors from loading, saving or validating a sidecar.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("sidecar io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed sidecar {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The snapshot parsed but contradicts itself or the data file.
    #[error("inconsistent sidecar: {0}")]
    Inconsistent(String),
}

/// Store-level counters and identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub name: String,
    pub format: String,
    /// Byte position where the next record will be written.
    pub file_offset: u64,
    /// Next stream id to hand out.
    pub ret_id: u64,
}

/// Complete persisted state of one store instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: Meta,
    #[serde(default)]
    pub offsets: BTreeMap<u64, Vec<u64>>,
}

impl Snapshot {
    /// Snapshot of a freshly created, empty store.
    pub fn empty(name: &str) -> Self {
        Self::capture(name, 0, 0, &OffsetIndex::new())
    }

    /// Snapshot of live store state.
    pub fn capture(name: &str, file_offset: u64, next_ret_id: u64, index: &OffsetIndex) -> Self {
        Self {
            meta: Meta {
                name: name.to_string(),
                format: FORMAT_TAG.to_string(),
                file_offset,
                ret_id: next_ret_id,
            },
            offsets: index.to_sorted(),
        }
    }

    /// Reads and parses the sidecar at `path`.
    ///
    /// Only parsing happens here; identity checks are the caller's job and
    /// structural checks live in [`validate`](Snapshot::validate).
    pub fn load(path: &Path) -> Result<Self, SidecarError> {
        let file = File::open(path).map_err(|source| SidecarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SidecarError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Persists the snapshot to `path`.
    ///
    /// Uses atomic rename (write `.tmp`, fsync, rename). If the rename fails
    /// (e.g. the target is held open on Windows), falls back to truncating and
    /// rewriting `path` in place, then removes the orphaned tmp file.
    pub fn save(&self, path: &Path) -> Result<(), SidecarError> {
        let tmp_path = tmp_path_for(path);
        let io_err = |p: &Path| {
            let p = p.to_path_buf();
            move |source: io::Error| SidecarError::Io { path: p, source }
        };

        self.write_to(&tmp_path).map_err(io_err(tmp_path.as_path()))?;

        if fs::rename(&tmp_path, path).is_err() {
            self.write_to(path).map_err(io_err(path))?;
            let _ = fs::remove_file(&tmp_path);
        }

        Ok(())
    }

    fn write_to(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut w = BufWriter::new(file);

        let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut w, fmt);
        self.serialize(&mut ser).map_err(io::Error::from)?;
        w.write_all(b"\n")?;

        w.flush()?;
        w.into_inner().map_err(|e| e.into_error())?.sync_all()
    }

    /// Checks that the snapshot can describe a data file of `data_len` bytes.
    ///
    /// - `fileOffset <= data_len`
    /// - every stream id is `< retId`
    /// - every offset list is strictly increasing and below `fileOffset`
    /// - no offset belongs to two streams
    pub fn validate(&self, data_len: u64) -> Result<(), SidecarError> {
        let meta = &self.meta;
        if meta.file_offset > data_len {
            return Err(SidecarError::Inconsistent(format!(
                "fileOffset {} is past the end of the data file ({} bytes)",
                meta.file_offset, data_len
            )));
        }

        let mut seen = HashSet::new();
        for (stream, offsets) in &self.offsets {
            if *stream >= meta.ret_id {
                return Err(SidecarError::Inconsistent(format!(
                    "stream {} was never generated (retId is {})",
                    stream, meta.ret_id
                )));
            }
            if let Some(w) = offsets.windows(2).find(|w| w[0] >= w[1]) {
                return Err(SidecarError::Inconsistent(format!(
                    "stream {}: offsets not strictly increasing ({} then {})",
                    stream, w[0], w[1]
                )));
            }
            if let Some(dup) = offsets.iter().find(|o| !seen.insert(**o)) {
                return Err(SidecarError::Inconsistent(format!(
                    "stream {}: offset {} is already used by another stream",
                    stream, dup
                )));
            }
            if let Some(&last) = offsets.last() {
                if last >= meta.file_offset {
                    return Err(SidecarError::Inconsistent(format!(
                        "stream {}: offset {} is at or past fileOffset {}",
                        stream, last, meta.file_offset
                    )));
                }
            }
        }

        Ok(())
    }

    /// Rebuilds the in-memory offset index from this snapshot.
    pub fn to_index(&self) -> OffsetIndex {
        self.offsets
            .iter()
            .map(|(s, l)| (*s, l.clone()))
            .collect()
    }
}

/// Temporary file used during atomic sidecar writes: `<path>.tmp`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
