//! # Codec - Record Encoding for the Record Store
//!
//! The record store never frames records itself. A record is written at some
//! offset of the shared data file and later decoded from that offset, so the
//! codec must be **self-framing**: `decode` consumes exactly the bytes that
//! `encode` produced for one record, no more and no less. Every other read in
//! the file depends on it.
//!
//! Two implementations are provided:
//!
//! | Codec                 | Framing                                          |
//! |-----------------------|--------------------------------------------------|
//! | [`BincodeCodec`]      | bincode's own (fixed-width ints, length-prefixed strings/vecs) |
//! | [`ChecksumCodec<C>`]  | `[body_len: u32 LE][crc32: u32 LE][body]` around any inner codec |
//!
//! ## Example
//!
//! ```rust
//! use codec::{BincodeCodec, ChecksumCodec, Codec};
//!
//! let codec = ChecksumCodec::new(BincodeCodec);
//! let mut buf = Vec::new();
//! codec.encode(&(7u64, "x".to_string()), &mut buf).unwrap();
//!
//! let back: (u64, String) = codec.decode(&mut &buf[..]).unwrap();
//! assert_eq!(back, (7, "x".to_string()));
//! ```

use bincode::Options;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{self, Read};
use thiserror::Error;

/// Largest record body either codec accepts (64 MiB).
/// Anything bigger is treated as corruption rather than allocated.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Bytes of framing [`ChecksumCodec`] adds in front of every body.
pub const FRAME_HEADER_BYTES: usize = 8;

/// Errors surfaced by a [`Codec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// An underlying I/O error (including hitting EOF mid-record).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// The bytes do not form a valid record.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<bincode::Error> for CodecError {
    fn from(e: bincode::Error) -> Self {
        match *e {
            bincode::ErrorKind::Io(io_err) => CodecError::Io(io_err),
            other => CodecError::Serialize(other.to_string()),
        }
    }
}

/// Encode/decode strategy for one record type.
///
/// The trait is object-safe, so a store can be handed either a concrete codec
/// or a `Box<dyn Codec<T> + Send + Sync>`.
pub trait Codec<T> {
    /// Appends the encoding of `value` to `out`.
    ///
    /// Must be deterministic. On error `out` may hold a partial encoding;
    /// callers discard the buffer.
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Decodes exactly one record from `reader`.
    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError>;
}

impl<T, C: Codec<T> + ?Sized> Codec<T> for Box<C> {
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
        (**self).encode(value, out)
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError> {
        (**self).decode(reader)
    }
}

/// Codec for any serde type, backed by bincode 1.x.
///
/// bincode reads fields with `read_exact` and prefixes every string and
/// sequence with its length, so decoding stops exactly at the end of the
/// record. A record may not exceed [`MAX_FRAME_BYTES`] in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for BincodeCodec {
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
        bincode_options().serialize_into(out, value)?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError> {
        Ok(bincode_options().deserialize_from(reader)?)
    }
}

/// bincode 1.x default layout (fixed-width ints, trailing bytes allowed) with
/// a size limit, so a corrupted length prefix fails instead of allocating.
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(u64::from(MAX_FRAME_BYTES))
}

/// Wraps an inner codec in a length + CRC32 frame.
///
/// Layout: `[body_len: u32 LE][crc32: u32 LE][body ...]` where `body` is the
/// inner codec's output. On decode the CRC is verified and the inner codec
/// must consume the whole body, so a read at a wrong offset or a torn write
/// fails loudly instead of yielding a bogus value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumCodec<C> {
    inner: C,
}

impl<C> ChecksumCodec<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<T, C: Codec<T>> Codec<T> for ChecksumCodec<C> {
    fn encode(&self, value: &T, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let start = out.len();

        // Reserve the frame header, filled once the body length is known.
        out.extend_from_slice(&[0u8; FRAME_HEADER_BYTES]);
        self.inner.encode(value, out)?;

        let body = &out[start + FRAME_HEADER_BYTES..];
        if body.len() > MAX_FRAME_BYTES as usize {
            return Err(CodecError::Serialize(format!(
                "record too large: {} bytes (max {})",
                body.len(),
                MAX_FRAME_BYTES
            )));
        }

        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();
        let body_len = body.len() as u32;

        let mut header = &mut out[start..start + FRAME_HEADER_BYTES];
        header.write_u32::<LittleEndian>(body_len)?;
        header.write_u32::<LittleEndian>(crc)?;
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError> {
        let body_len = reader.read_u32::<LittleEndian>()?;
        if body_len > MAX_FRAME_BYTES {
            return Err(CodecError::Corrupt(format!(
                "frame length {} exceeds maximum {}",
                body_len, MAX_FRAME_BYTES
            )));
        }
        let crc = reader.read_u32::<LittleEndian>()?;

        let mut body = vec![0u8; body_len as usize];
        reader.read_exact(&mut body)?;

        let mut hasher = Crc32::new();
        hasher.update(&body);
        let actual = hasher.finalize();
        if actual != crc {
            return Err(CodecError::Corrupt(format!(
                "crc mismatch: stored {:#010x}, computed {:#010x}",
                crc, actual
            )));
        }

        let mut rest = &body[..];
        let value = self.inner.decode(&mut rest)?;
        if !rest.is_empty() {
            return Err(CodecError::Corrupt(format!(
                "{} trailing bytes after record body",
                rest.len()
            )));
        }
        Ok(value)
    }
}
