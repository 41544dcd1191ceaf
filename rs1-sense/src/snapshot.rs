//! Shared active-zone snapshot between housekeeping and sensing contexts.

use std::sync::Arc;

use parking_lot::Mutex;

use rs1_types::ZoneStore;

/// Single-writer, many-reader handle to the active [`ZoneStore`].
///
/// The config store (housekeeping context) swaps in a new `Arc` under the
/// mutex; the sensing context takes a clone of the `Arc` per frame as its
/// read lease. The lock is held only for the pointer copy, so a frame
/// either sees the whole old snapshot or the whole new one.
pub struct ActiveZones {
    inner: Mutex<Arc<ZoneStore>>,
}

impl ActiveZones {
    pub fn new(initial: ZoneStore) -> Self {
        ActiveZones {
            inner: Mutex::new(Arc::new(initial)),
        }
    }

    pub fn empty() -> Self {
        ActiveZones::new(ZoneStore::default())
    }

    /// Read lease for one frame.
    pub fn snapshot(&self) -> Arc<ZoneStore> {
        self.inner.lock().clone()
    }

    /// Atomically replace the active snapshot.
    pub fn install(&self, store: ZoneStore) {
        *self.inner.lock() = Arc::new(store);
    }
}

impl Default for ActiveZones {
    fn default() -> Self {
        ActiveZones::empty()
    }
}
