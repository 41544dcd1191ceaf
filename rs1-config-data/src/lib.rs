//! Atomic, versioned persistence for RS-1 zones and settings.
//!
//! The store sits on a namespaced flash key/value backend. Zone writes go
//! through a shadow-key protocol so power loss at any step leaves either
//! the old or the new snapshot recoverable, never a torn one:
//!
//! 1. validate the candidate
//! 2. bump version, checksum
//! 3. write `zones_new`
//! 4. copy `zones` → `zones_prev`
//! 5. overwrite `zones`
//! 6. erase `zones_new`
//! 7. commit
//!
//! Recovery at init discards a leftover `zones_new` and falls back to
//! `zones_prev` when `zones` fails its CRC or validation. The `network`
//! and `security` records are encrypted with a device-bound AES-128-GCM
//! key; everything else is stored as plain flat images.
//!
//! Commits happen only on explicit mutations, never on a timer.

use tracing::{error, info, warn};

use rs1_types::{ZoneStore, ZoneValidationError, ZoneWarning};

mod crypto;
mod flash;
mod records;

pub mod global;

pub use crypto::{derive_device_key, CryptoError};
pub use flash::{FlashError, FlashKv, MemFlash};
pub use records::{
    CalibrationRecord, DeviceRecord, NetworkRecord, RecordError, SecurityRecord,
};

/// Logical keys in the flash namespace.
pub const KEY_ZONES: &str = "zones";
pub const KEY_ZONES_PREV: &str = "zones_prev";
pub const KEY_ZONES_NEW: &str = "zones_new";
pub const KEY_DEVICE: &str = "device";
pub const KEY_NETWORK: &str = "network";
pub const KEY_SECURITY: &str = "security";
pub const KEY_CALIBRATION: &str = "calibration";

const ALL_KEYS: [&str; 7] = [
    KEY_ZONES,
    KEY_ZONES_PREV,
    KEY_ZONES_NEW,
    KEY_DEVICE,
    KEY_NETWORK,
    KEY_SECURITY,
    KEY_CALIBRATION,
];

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid zone store: {0}")]
    Invalid(#[from] ZoneValidationError),
    #[error("integrity check failed: {0}")]
    Checksum(String),
    #[error("{0}")]
    Flash(#[from] FlashError),
    #[error("config store not initialized")]
    NotInitialized,
    #[error("config store already initialized")]
    AlreadyInitialized,
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
}

impl From<RecordError> for ConfigError {
    fn from(e: RecordError) -> Self {
        ConfigError::Checksum(e.to_string())
    }
}

/// The config store. One instance per device, created by [`ConfigStore::init`].
pub struct ConfigStore<F: FlashKv> {
    flash: F,
    key: [u8; 16],
    active: Option<ZoneStore>,
    commit_count: u32,
}

/// Read a zone image from flash and fully check it (CRC + validation).
fn load_valid_zones<F: FlashKv>(flash: &F, key: &str) -> Result<Option<ZoneStore>> {
    let Some(bytes) = flash.get(key)? else {
        return Ok(None);
    };
    let store = match ZoneStore::from_bytes(&bytes) {
        Ok(store) => store,
        Err(e) => {
            warn!(key, error = %e, "stored zone image rejected");
            return Ok(None);
        }
    };
    match store.validate() {
        Ok(_) => Ok(Some(store)),
        Err(e) => {
            warn!(key, error = %e, "stored zone image fails validation");
            Ok(None)
        }
    }
}

impl<F: FlashKv> ConfigStore<F> {
    /// Mount the store and run crash recovery.
    ///
    /// The MAC binds the encryption key to this device; it lives in
    /// hardware fuses, outside this store.
    pub fn init(mut flash: F, mac: &[u8; 6]) -> Result<Self> {
        // A leftover shadow key means a write never reached step 5; the
        // candidate is discarded.
        if flash.contains(KEY_ZONES_NEW)? {
            warn!("discarding interrupted zone write");
            flash.erase(KEY_ZONES_NEW)?;
            flash.commit()?;
        }

        let active = match load_valid_zones(&flash, KEY_ZONES)? {
            Some(store) => Some(store),
            None => {
                if flash.contains(KEY_ZONES)? {
                    // Present but corrupt: try the rollback copy.
                    match load_valid_zones(&flash, KEY_ZONES_PREV)? {
                        Some(prev) => {
                            error!(
                                restored_version = prev.version,
                                "active zone store corrupt, restored previous"
                            );
                            flash.set(KEY_ZONES, &prev.to_bytes())?;
                            flash.commit()?;
                            Some(prev)
                        }
                        None => {
                            error!("zone store corrupt with no valid rollback, starting empty");
                            flash.erase(KEY_ZONES)?;
                            flash.commit()?;
                            None
                        }
                    }
                } else {
                    None
                }
            }
        };

        if let Some(store) = &active {
            info!(
                version = store.version,
                zones = store.zones.len(),
                "zone store loaded"
            );
        } else {
            info!("no zones configured");
        }

        Ok(ConfigStore {
            flash,
            key: crypto::derive_device_key(mac),
            active,
            commit_count: 0,
        })
    }

    fn commit(&mut self) -> Result<()> {
        self.flash.commit()?;
        self.commit_count += 1;
        Ok(())
    }

    /// Lifetime (since boot) count of flash commits, for the monitoring task.
    pub fn commit_count(&self) -> u32 {
        self.commit_count
    }

    // ------------------------------------------------------------------
    // Zones

    pub fn get_zones(&self) -> Option<ZoneStore> {
        self.active.clone()
    }

    pub fn get_zone(&self, id: &str) -> Option<rs1_types::Zone> {
        self.active.as_ref().and_then(|s| s.get(id).cloned())
    }

    /// Atomic zone update per the shadow-key protocol.
    ///
    /// On success the new snapshot is active and the previous one is kept
    /// for rollback. On any error the previously active snapshot remains
    /// in force.
    pub fn set_zones(&mut self, mut candidate: ZoneStore) -> Result<Vec<ZoneWarning>> {
        let warnings = candidate.validate()?;
        for w in &warnings {
            warn!(?w, "zone validation warning");
        }

        candidate.version = self.active.as_ref().map(|a| a.version).unwrap_or(0) + 1;
        let image = candidate.to_bytes();

        self.flash.set(KEY_ZONES_NEW, &image)?;
        if let Some(current) = self.flash.get(KEY_ZONES)? {
            self.flash.set(KEY_ZONES_PREV, &current)?;
        }
        self.flash.set(KEY_ZONES, &image)?;
        self.flash.erase(KEY_ZONES_NEW)?;
        self.commit()?;

        info!(
            version = candidate.version,
            zones = candidate.zones.len(),
            "zone store updated"
        );
        self.active = Some(candidate);
        Ok(warnings)
    }

    pub fn has_zone_rollback(&self) -> bool {
        matches!(load_valid_zones(&self.flash, KEY_ZONES_PREV), Ok(Some(_)))
    }

    /// Swap the active store with the rollback copy.
    pub fn rollback_zones(&mut self) -> Result<ZoneStore> {
        let prev =
            load_valid_zones(&self.flash, KEY_ZONES_PREV)?.ok_or(ConfigError::Checksum(
                "no valid rollback snapshot".to_string(),
            ))?;
        if let Some(current) = self.flash.get(KEY_ZONES)? {
            self.flash.set(KEY_ZONES_PREV, &current)?;
        }
        self.flash.set(KEY_ZONES, &prev.to_bytes())?;
        self.commit()?;
        info!(version = prev.version, "zone store rolled back");
        self.active = Some(prev.clone());
        Ok(prev)
    }

    // ------------------------------------------------------------------
    // Plain records

    pub fn get_device(&self) -> Result<DeviceRecord> {
        match self.flash.get(KEY_DEVICE)? {
            Some(bytes) => Ok(DeviceRecord::from_bytes(&bytes)?),
            None => Ok(DeviceRecord::default()),
        }
    }

    pub fn set_device(&mut self, record: &DeviceRecord) -> Result<()> {
        self.flash.set(KEY_DEVICE, &record.to_bytes())?;
        self.commit()
    }

    pub fn get_calibration(&self) -> Result<CalibrationRecord> {
        match self.flash.get(KEY_CALIBRATION)? {
            Some(bytes) => Ok(CalibrationRecord::from_bytes(&bytes)?),
            None => Ok(CalibrationRecord::default()),
        }
    }

    pub fn set_calibration(&mut self, record: &CalibrationRecord) -> Result<()> {
        self.flash.set(KEY_CALIBRATION, &record.to_bytes())?;
        self.commit()
    }

    // ------------------------------------------------------------------
    // Encrypted records

    fn get_sealed(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.flash.get(key)? {
            Some(blob) => Ok(Some(crypto::open(&self.key, &blob)?)),
            None => Ok(None),
        }
    }

    fn set_sealed(&mut self, key: &str, plaintext: &[u8]) -> Result<()> {
        let blob = crypto::seal(&self.key, plaintext);
        self.flash.set(key, &blob)?;
        self.commit()
    }

    pub fn get_network(&self) -> Result<NetworkRecord> {
        match self.get_sealed(KEY_NETWORK)? {
            Some(bytes) => Ok(NetworkRecord::from_bytes(&bytes)?),
            None => Ok(NetworkRecord::default()),
        }
    }

    pub fn set_network(&mut self, record: &NetworkRecord) -> Result<()> {
        self.set_sealed(KEY_NETWORK, &record.to_bytes())
    }

    pub fn get_security(&self) -> Result<SecurityRecord> {
        match self.get_sealed(KEY_SECURITY)? {
            Some(bytes) => Ok(SecurityRecord::from_bytes(&bytes)?),
            None => Ok(SecurityRecord::default()),
        }
    }

    pub fn set_security(&mut self, record: &SecurityRecord) -> Result<()> {
        self.set_sealed(KEY_SECURITY, &record.to_bytes())
    }

    // ------------------------------------------------------------------

    /// Erase every key. Device identity (the MAC) lives in hardware fuses
    /// and survives.
    pub fn factory_reset(&mut self) -> Result<()> {
        for key in ALL_KEYS {
            self.flash.erase(key)?;
        }
        self.commit()?;
        self.active = None;
        info!("factory reset complete");
        Ok(())
    }

    /// Consume the store, returning the backend (test reboot simulation).
    pub fn into_flash(self) -> F {
        self.flash
    }
}
