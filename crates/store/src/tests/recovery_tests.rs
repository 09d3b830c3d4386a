use super::helpers::*;
use crate::{BincodeCodec, ErrorKind, RecordStore, StoreError};
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Recovery equivalence ---------------------

#[test]
fn reopen_restores_every_element() -> Result<()> {
    let dir = tempdir()?;
    let mut expected: Vec<(u64, Vec<Rec>)> = Vec::new();

    {
        let store = open_recs(dir.path(), "reopen")?;
        for _ in 0..3 {
            expected.push((store.generate_ret_id()?, Vec::new()));
        }
        for i in 0..30u64 {
            let slot = (i * 7 % 3) as usize;
            let r = rec(i);
            store.append(expected[slot].0, &r)?;
            expected[slot].1.push(r);
        }
    }

    let store = open_recs(dir.path(), "reopen")?;
    for (s, records) in &expected {
        assert_eq!(store.element_count(*s)?, records.len());
        for (i, r) in records.iter().enumerate() {
            assert_eq!(&store.read(*s, i)?, r);
        }
    }
    Ok(())
}

#[test]
fn ids_continue_after_recovery() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_recs(dir.path(), "ids")?;
        store.generate_ret_id()?;
        store.generate_ret_id()?;
        // generated but never appended to
        store.generate_ret_id()?;
    }

    let store = open_recs(dir.path(), "ids")?;
    assert_eq!(store.peek_ret_id()?, 2);
    assert_eq!(store.element_count(2)?, 0);
    assert_eq!(store.generate_ret_id()?, 3);
    Ok(())
}

#[test]
fn appends_continue_after_recovery() -> Result<()> {
    let dir = tempdir()?;
    let cursor;
    {
        let store = open_recs(dir.path(), "cont")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
        cursor = store.write_cursor();
    }

    let store = open_recs(dir.path(), "cont")?;
    assert_eq!(store.write_cursor(), cursor);
    store.append(0, &rec(1))?;
    let t = store.generate_ret_id()?;
    store.append(t, &rec(2))?;

    assert_eq!(store.read(0, 0)?, rec(0));
    assert_eq!(store.read(0, 1)?, rec(1));
    assert_eq!(store.read(t, 0)?, rec(2));
    Ok(())
}

#[test]
fn recover_disabled_starts_fresh() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_recs(dir.path(), "fresh")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
    }

    let cfg = config(dir.path(), "fresh").recover_if_exists(false);
    let store: RecStore = RecordStore::open(cfg, BincodeCodec)?;
    assert_eq!(store.write_cursor(), 0);
    assert_eq!(data_len(store.data_path()), 0);
    assert!(matches!(store.element_count(0), Err(StoreError::UnknownStream(0))));
    assert_eq!(store.generate_ret_id()?, 0);
    Ok(())
}

#[test]
fn missing_sidecar_starts_fresh() -> Result<()> {
    let dir = tempdir()?;
    let sidecar_path;
    {
        let store = open_recs(dir.path(), "half")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
        sidecar_path = store.sidecar_path().to_path_buf();
    }
    fs::remove_file(&sidecar_path)?;

    let store = open_recs(dir.path(), "half")?;
    assert_eq!(store.write_cursor(), 0);
    assert_eq!(store.total_elements(), 0);
    assert!(sidecar_path.exists(), "fresh store writes an empty sidecar");
    Ok(())
}

#[test]
fn open_creates_base_dir_and_both_files() -> Result<()> {
    let dir = tempdir()?;
    let base = dir.path().join("nested").join("stores");
    let store = open_recs(&base, "new")?;

    assert!(base.is_dir());
    assert!(store.data_path().exists());
    assert!(store.sidecar_path().exists());
    assert_eq!(store.data_path(), base.join("new.bin"));
    assert_eq!(store.sidecar_path(), base.join("new.json"));
    Ok(())
}

#[test]
fn open_removes_leftover_sidecar_tmp() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_recs(dir.path(), "tmp")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
    }
    // a save interrupted before its rename
    let tmp = dir.path().join("tmp.json.tmp");
    fs::write(&tmp, "{\"meta\": {\"na")?;

    let store = open_recs(dir.path(), "tmp")?;
    assert!(!tmp.exists());
    assert_eq!(store.read(0, 0)?, rec(0));
    Ok(())
}

// --------------------- Validation failures ---------------------

#[test]
fn name_mismatch_is_config_error() -> Result<()> {
    let dir = tempdir()?;
    drop(open_recs(dir.path(), "alpha")?);
    fs::rename(dir.path().join("alpha.bin"), dir.path().join("beta.bin"))?;
    fs::rename(dir.path().join("alpha.json"), dir.path().join("beta.json"))?;

    let err = open_recs(dir.path(), "beta").unwrap_err();
    assert!(matches!(err, StoreError::ConfigMismatch { field: "name", .. }));
    assert_eq!(err.kind(), ErrorKind::Config);
    Ok(())
}

#[test]
fn format_mismatch_is_config_error() -> Result<()> {
    let dir = tempdir()?;
    drop(open_recs(dir.path(), "fmt")?);
    let path = dir.path().join("fmt.json");
    let text = fs::read_to_string(&path)?.replace("RawFmt01", "RawFmt02");
    fs::write(&path, text)?;

    let err = open_recs(dir.path(), "fmt").unwrap_err();
    assert!(matches!(err, StoreError::ConfigMismatch { field: "format", .. }));
    Ok(())
}

#[test]
fn malformed_sidecar_is_metadata_error() -> Result<()> {
    let dir = tempdir()?;
    drop(open_recs(dir.path(), "bad")?);
    fs::write(dir.path().join("bad.json"), "{\"meta\": ")?;

    let err = open_recs(dir.path(), "bad").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Metadata);
    Ok(())
}

#[test]
fn shrunken_data_file_is_metadata_error() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_recs(dir.path(), "short")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
        store.append(s, &rec(1))?;
    }
    let data = dir.path().join("short.bin");
    let len = data_len(&data);
    fs::OpenOptions::new().write(true).open(&data)?.set_len(len - 1)?;

    let err = open_recs(dir.path(), "short").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Metadata);
    Ok(())
}

#[test]
fn invalid_name_fails_before_touching_disk() -> Result<()> {
    let dir = tempdir()?;
    let base = dir.path().join("never");
    let err = open_recs(&base, "../escape").unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig(_)));
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(!base.exists());
    Ok(())
}

// --------------------- Unindexed tail ---------------------

#[test]
fn crash_after_checkpoint_drops_unindexed_tail() -> Result<()> {
    let dir = tempdir()?;
    let (s, checkpointed) = {
        let store = open_recs(dir.path(), "crash")?;
        let s = store.generate_ret_id()?;
        store.append(s, &rec(0))?;
        store.append(s, &rec(1))?;
        store.checkpoint()?;
        let cursor = store.write_cursor();

        store.append(s, &rec(2))?;
        assert!(data_len(store.data_path()) > cursor);

        // simulate abnormal termination: no drop, no sidecar write
        std::mem::forget(store);
        (s, cursor)
    };

    let store = open_recs(dir.path(), "crash")?;
    assert_eq!(store.element_count(s)?, 2);
    assert_eq!(store.write_cursor(), checkpointed);
    assert_eq!(data_len(store.data_path()), checkpointed);

    assert_eq!(store.append(s, &rec(3))?, 2);
    assert_eq!(store.read(s, 1)?, rec(1));
    assert_eq!(store.read(s, 2)?, rec(3));
    Ok(())
}
