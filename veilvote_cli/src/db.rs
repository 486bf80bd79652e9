//! File persistence for the shared vote store: a CBOR snapshot, reloaded
//! on startup and rewritten after every accepted session.

use std::path::Path;
use veilvote::{Error, MemStore};

pub fn load_store<P: AsRef<Path>>(path: P) -> Result<MemStore, Error> {
    if !path.as_ref().exists() {
        return Ok(MemStore::default());
    }
    let bytes = std::fs::read(path)?;
    Ok(serde_cbor::from_slice(&bytes)?)
}

pub fn save_store<P: AsRef<Path>>(path: P, store: &MemStore) -> Result<(), Error> {
    let bytes = serde_cbor::to_vec(store)?;
    Ok(std::fs::write(path, bytes)?)
}
