//! Per-provider request counters persisted to a JSON file and reset at each
//! calendar month.
//!
//! The whole table is rewritten after every increment. There is no
//! cross-process locking: two processes sharing one usage file can lose an
//! increment. Within a process all mutations go through one async mutex.

mod month;

pub use month::BillingMonth;

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("usage file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("usage file I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("usage file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub count: u32,
    pub month: String,
}

/// Provider identifier → usage record. Ordered so the file is stable across rewrites.
pub type UsageTable = BTreeMap<String, UsageRecord>;

type Clock = Arc<dyn Fn() -> BillingMonth + Send + Sync>;

pub struct UsageStore {
    table: Mutex<UsageTable>,
    path: Option<PathBuf>,
    clock: Clock,
}

impl UsageStore {
    /// Open the store backed by `path`. A missing or unreadable file yields an
    /// empty table; searching must never be blocked by the usage file.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match load(&path).await {
            Ok(table) => {
                info!(path = %path.display(), providers = table.len(), "usage table loaded");
                table
            }
            Err(UsageError::NotFound(_)) => {
                debug!(path = %path.display(), "no usage file yet, starting empty");
                UsageTable::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable usage file, starting empty");
                UsageTable::new()
            }
        };
        Self {
            table: Mutex::new(table),
            path: Some(path),
            clock: Arc::new(BillingMonth::current),
        }
    }

    /// A store that never touches the filesystem.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::from_table(UsageTable::new())
    }

    #[cfg(test)]
    pub fn from_table(table: UsageTable) -> Self {
        Self {
            table: Mutex::new(table),
            path: None,
            clock: Arc::new(BillingMonth::current),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: impl Fn() -> BillingMonth + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn current_month(&self) -> BillingMonth {
        (self.clock)()
    }

    /// Requests charged to `provider` in the current billing month. A stale
    /// record is reset in memory; a provider with no record is left absent.
    pub async fn get_usage(&self, provider: &str) -> u32 {
        let month = self.current_month().to_string();
        let mut table = self.table.lock().await;
        match table.get_mut(provider) {
            Some(record) => {
                roll_over(record, provider, &month);
                record.count
            }
            None => 0,
        }
    }

    /// Charge one request to `provider` and rewrite the usage file.
    pub async fn increment(&self, provider: &str) {
        let month = self.current_month().to_string();
        let mut table = self.table.lock().await;
        let record = table
            .entry(provider.to_string())
            .or_insert_with(|| UsageRecord {
                count: 0,
                month: month.clone(),
            });
        roll_over(record, provider, &month);
        record.count = record.count.saturating_add(1);
        debug!(provider, count = record.count, month = %month, "usage incremented");

        // Written under the lock so concurrent increments reach disk in order.
        if let Some(path) = &self.path
            && let Err(e) = save(path, &table).await
        {
            warn!(path = %path.display(), error = %e, "failed to persist usage table");
        }
    }
}

/// Zero `record` when it belongs to an earlier month than `month`.
fn roll_over(record: &mut UsageRecord, provider: &str, month: &str) {
    if record.month != month {
        debug!(provider, stale = %record.month, current = %month, "usage month rolled over");
        *record = UsageRecord {
            count: 0,
            month: month.to_string(),
        };
    }
}

/// Read the usage table at `path`. Entries that don't decode as a usage record
/// are dropped with a warning rather than failing the whole file.
pub async fn load(path: &Path) -> Result<UsageTable, UsageError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(UsageError::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;
    let mut table = UsageTable::new();
    for (provider, value) in raw {
        match serde_json::from_value::<UsageRecord>(value) {
            Ok(record) => {
                table.insert(provider, record);
            }
            Err(e) => warn!(provider = %provider, error = %e, "skipping malformed usage entry"),
        }
    }
    Ok(table)
}

async fn save(path: &Path, table: &UsageTable) -> Result<(), UsageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(table)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
