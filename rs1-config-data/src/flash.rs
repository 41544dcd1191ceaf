//! Flash key/value abstraction and the in-memory test double.

use std::collections::HashMap;

/// Failure talking to the underlying flash driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("flash: {0}")]
pub struct FlashError(pub String);

/// Namespaced key/value storage, NVS-style.
///
/// Each `set` must be individually durable once it returns; `commit`
/// flushes any driver-side write-back. The config store calls `commit`
/// only on explicit mutations, never on a timer.
pub trait FlashKv: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FlashError>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), FlashError>;
    /// Returns whether the key existed.
    fn erase(&mut self, key: &str) -> Result<bool, FlashError>;
    fn contains(&self, key: &str) -> Result<bool, FlashError>;
    fn commit(&mut self) -> Result<(), FlashError>;
}

impl FlashKv for Box<dyn FlashKv> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FlashError> {
        (**self).get(key)
    }
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), FlashError> {
        (**self).set(key, value)
    }
    fn erase(&mut self, key: &str) -> Result<bool, FlashError> {
        (**self).erase(key)
    }
    fn contains(&self, key: &str) -> Result<bool, FlashError> {
        (**self).contains(key)
    }
    fn commit(&mut self) -> Result<(), FlashError> {
        (**self).commit()
    }
}

/// In-memory flash with optional fault injection.
///
/// With a mutation budget set, every `set`/`erase` spends one unit; once
/// exhausted every mutation fails, emulating power loss partway through a
/// multi-step write. The surviving map can be lifted out and re-mounted to
/// emulate the subsequent reboot.
#[derive(Debug, Clone, Default)]
pub struct MemFlash {
    map: HashMap<String, Vec<u8>>,
    mutation_budget: Option<u32>,
}

impl MemFlash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: HashMap<String, Vec<u8>>) -> Self {
        MemFlash {
            map,
            mutation_budget: None,
        }
    }

    /// Allow exactly `n` further mutations, then fail everything.
    pub fn set_mutation_budget(&mut self, n: u32) {
        self.mutation_budget = Some(n);
    }

    pub fn clear_mutation_budget(&mut self) {
        self.mutation_budget = None;
    }

    /// The persisted content, for reboot simulation.
    pub fn into_map(self) -> HashMap<String, Vec<u8>> {
        self.map
    }

    pub fn map(&self) -> &HashMap<String, Vec<u8>> {
        &self.map
    }

    fn spend(&mut self) -> Result<(), FlashError> {
        match &mut self.mutation_budget {
            None => Ok(()),
            Some(0) => Err(FlashError("simulated power loss".to_string())),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
        }
    }
}

impl FlashKv for MemFlash {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, FlashError> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), FlashError> {
        self.spend()?;
        self.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn erase(&mut self, key: &str) -> Result<bool, FlashError> {
        self.spend()?;
        Ok(self.map.remove(key).is_some())
    }

    fn contains(&self, key: &str) -> Result<bool, FlashError> {
        Ok(self.map.contains_key(key))
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        Ok(())
    }
}
