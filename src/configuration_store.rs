//! Read access to bar configuration.
//!
//! [`InMemoryConfigStore`] holds an immutable snapshot of every account's bar. A snapshot is only
//! ever replaced as a whole, so a reader always sees a consistent set of bars.
use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::Path,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::{
    models::{BarConfig, TryParse},
    validation::validate_bar,
    Error, Result,
};

/// Source of bar configuration keyed by account.
pub trait ConfigStore {
    /// The bar configured for `account_key`, whether active or not. `Ok(None)` if the account is
    /// unknown. Errors mean the store itself could not be read.
    fn get_active_bar_config(&self, account_key: &str) -> Result<Option<Arc<BarConfig>>>;
}

/// Wire format of a configuration snapshot: one bar per account key.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub bars: HashMap<String, TryParse<BarConfig>>,
}

impl Snapshot {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Snapshot> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

type Bars = HashMap<String, Arc<BarConfig>>;

/// `InMemoryConfigStore` provides a thread-safe (`Sync`) storage for bar configuration that
/// allows concurrent access for readers and writers.
#[derive(Default)]
pub struct InMemoryConfigStore {
    bars: RwLock<Option<Arc<Bars>>>,
}

impl InMemoryConfigStore {
    /// Create an empty store. Reads fail with [`Error::StoreUnavailable`] until the first snapshot
    /// is set.
    pub fn new() -> Self {
        InMemoryConfigStore::default()
    }

    /// Replace the current snapshot, returning the number of bars that parsed.
    ///
    /// Bars that failed to parse are dropped. Configuration diagnostics are logged but never
    /// reject a bar.
    pub fn set_snapshot(&self, snapshot: Snapshot) -> usize {
        let mut bars = Bars::with_capacity(snapshot.bars.len());
        for (account_key, bar) in snapshot.bars {
            match bar {
                TryParse::Parsed(bar) => {
                    for error in validate_bar(&bar) {
                        log::warn!(target: "announcement_bar",
                                   account_key:display = account_key;
                                   "configuration problem: {}", error);
                    }
                    bars.insert(account_key, Arc::new(bar));
                }
                TryParse::ParseFailed(_) => {
                    log::warn!(target: "announcement_bar",
                               account_key:display = account_key;
                               "failed to parse bar configuration, skipping account");
                }
            }
        }

        let count = bars.len();
        // Constructing new value before requesting the lock to minimize lock span.
        let new_value = Some(Arc::new(bars));
        match self.bars.write() {
            Ok(mut slot) => *slot = new_value,
            Err(_) => {
                log::warn!(target: "announcement_bar", "configuration lock poisoned, snapshot dropped");
            }
        }
        count
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn get_active_bar_config(&self, account_key: &str) -> Result<Option<Arc<BarConfig>>> {
        // Err() is possible only if the lock is poisoned (writer panicked while holding the
        // lock), which should never happen. Still, report it instead of crashing the server.
        let bars = self.bars.read().map_err(|_| Error::StoreUnavailable)?;
        let bars = bars.as_ref().ok_or(Error::StoreUnavailable)?;
        Ok(bars.get(account_key).cloned())
    }
}
