//! Process-wide config store singleton.
//!
//! Firmware keeps one store for the device's lifetime; subsystems reach it
//! through [`with_store`] from the housekeeping context. Init is once-only
//! and explicit; [`deinit`] exists for tests and controlled shutdown.

use parking_lot::Mutex;

use crate::{ConfigError, ConfigStore, FlashKv, Result};

static STORE: Mutex<Option<ConfigStore<Box<dyn FlashKv>>>> = Mutex::new(None);

/// Mount the global store. Fails if already initialized.
pub fn init(flash: Box<dyn FlashKv>, mac: &[u8; 6]) -> Result<()> {
    let mut guard = STORE.lock();
    if guard.is_some() {
        return Err(ConfigError::AlreadyInitialized);
    }
    *guard = Some(ConfigStore::init(flash, mac)?);
    Ok(())
}

/// Tear down the global store, flushing nothing (commits are explicit).
pub fn deinit() {
    *STORE.lock() = None;
}

/// Run `f` against the global store.
///
/// Returns [`ConfigError::NotInitialized`] when [`init`] has not run.
pub fn with_store<R>(f: impl FnOnce(&mut ConfigStore<Box<dyn FlashKv>>) -> R) -> Result<R> {
    let mut guard = STORE.lock();
    match guard.as_mut() {
        Some(store) => Ok(f(store)),
        None => Err(ConfigError::NotInitialized),
    }
}
