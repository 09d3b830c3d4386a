use crate::{BincodeCodec, ChecksumCodec, Codec, CodecError, RecordStore, StoreConfig};
use std::io::Read;
use std::path::Path;

/// Record shape used by most tests: an element number plus a payload.
pub type Rec = (u64, String);

pub type RecStore = RecordStore<Rec, BincodeCodec>;
pub type StringStore = RecordStore<String, ChecksumCodec<BincodeCodec>>;

pub fn rec(i: u64) -> Rec {
    (i, format!("payload-{}", i))
}

pub fn config(dir: &Path, name: &str) -> StoreConfig {
    StoreConfig::new(dir, name)
}

pub fn open_recs(dir: &Path, name: &str) -> crate::Result<RecStore> {
    RecordStore::open(config(dir, name), BincodeCodec)
}

pub fn open_strings(dir: &Path, name: &str) -> crate::Result<StringStore> {
    RecordStore::open(config(dir, name), ChecksumCodec::new(BincodeCodec))
}

pub fn data_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

/// Fails to encode the value `"boom"` after writing some bytes into the
/// buffer; everything else goes through bincode.
pub struct FlakyCodec;

impl Codec<String> for FlakyCodec {
    fn encode(&self, value: &String, out: &mut Vec<u8>) -> std::result::Result<(), CodecError> {
        if value == "boom" {
            out.extend_from_slice(b"partial");
            return Err(CodecError::Serialize("refusing to encode boom".to_string()));
        }
        BincodeCodec.encode(value, out)
    }

    fn decode(&self, reader: &mut dyn Read) -> std::result::Result<String, CodecError> {
        BincodeCodec.decode(reader)
    }
}

/// Encodes every value to zero bytes.
pub struct EmptyCodec;

impl Codec<u8> for EmptyCodec {
    fn encode(&self, _value: &u8, _out: &mut Vec<u8>) -> std::result::Result<(), CodecError> {
        Ok(())
    }

    fn decode(&self, _reader: &mut dyn Read) -> std::result::Result<u8, CodecError> {
        Ok(0)
    }
}
