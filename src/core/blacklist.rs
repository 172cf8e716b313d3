//! Persistent blacklist of known-bad addresses
//!
//! Four independent sets (tokens, developers, contracts, domains) stored as
//! one pretty-printed JSON document. Every mutation rewrites the whole file
//! while holding the store's write lock: the new document goes to a temp
//! file next to the target and is renamed over it, so neither concurrent
//! readers nor a crash can observe a half-written blacklist.
//!
//! Addresses are normalized to lowercase on write and on lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

use crate::models::{BlacklistCategory, ErrorCode, ScreenError, ScreenResult};

/// In-memory blacklist document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blacklist {
    #[serde(default)]
    pub tokens: BTreeSet<String>,
    #[serde(default)]
    pub developers: BTreeSet<String>,
    #[serde(default)]
    pub contracts: BTreeSet<String>,
    #[serde(default)]
    pub domains: BTreeSet<String>,
}

impl Blacklist {
    /// Load from disk. Never fails: a missing file is an empty blacklist,
    /// an unreadable or corrupt one is an empty blacklist plus a warning.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match Self::parse(&content) {
                Ok(blacklist) => {
                    info!(
                        "📋 Loaded blacklists from {} ({} entries)",
                        path.display(),
                        blacklist.len()
                    );
                    blacklist
                }
                Err(e) => {
                    warn!("⚠️ Error loading blacklists from {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "Blacklist file {} not found. Creating new blacklists.",
                    path.display()
                );
                Self::default()
            }
            Err(e) => {
                warn!("⚠️ Error reading blacklist file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse a blacklist document. Blank input is an empty blacklist.
    pub fn parse(content: &str) -> ScreenResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let parsed: Blacklist = serde_json::from_str(content).map_err(|e| {
            ScreenError::with_source(ErrorCode::StorageParse, "Invalid blacklist document", e)
        })?;
        Ok(parsed.normalized())
    }

    /// Write the full document, replacing the previous file atomically
    pub fn write_to(&self, path: &Path) -> ScreenResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ScreenError::with_source(
                    ErrorCode::StorageWrite,
                    format!("Cannot create directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ScreenError::with_source(ErrorCode::StorageWrite, "Cannot serialize blacklists", e)
        })?;

        let tmp_path = Self::temp_path(path);
        fs::write(&tmp_path, json).map_err(|e| {
            ScreenError::with_source(
                ErrorCode::StorageWrite,
                format!("Cannot write {}", tmp_path.display()),
                e,
            )
        })?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            ScreenError::with_source(
                ErrorCode::StorageWrite,
                format!("Cannot replace {}", path.display()),
                e,
            )
        })
    }

    pub fn set(&self, category: BlacklistCategory) -> &BTreeSet<String> {
        match category {
            BlacklistCategory::Tokens => &self.tokens,
            BlacklistCategory::Developers => &self.developers,
            BlacklistCategory::Contracts => &self.contracts,
            BlacklistCategory::Domains => &self.domains,
        }
    }

    fn set_mut(&mut self, category: BlacklistCategory) -> &mut BTreeSet<String> {
        match category {
            BlacklistCategory::Tokens => &mut self.tokens,
            BlacklistCategory::Developers => &mut self.developers,
            BlacklistCategory::Contracts => &mut self.contracts,
            BlacklistCategory::Domains => &mut self.domains,
        }
    }

    pub fn contains(&self, category: BlacklistCategory, address: &str) -> bool {
        self.set(category).contains(&normalize(address))
    }

    /// Total entries across all categories
    pub fn len(&self) -> usize {
        BlacklistCategory::ALL.iter().map(|c| self.set(*c).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn normalized(self) -> Self {
        let lower = |set: BTreeSet<String>| -> BTreeSet<String> {
            set.iter().map(|a| normalize(a)).collect()
        };
        Self {
            tokens: lower(self.tokens),
            developers: lower(self.developers),
            contracts: lower(self.contracts),
            domains: lower(self.domains),
        }
    }

    fn temp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "blacklists".to_string());
        path.with_file_name(format!(".{}.tmp", file_name))
    }
}

#[inline]
fn normalize(address: &str) -> String {
    address.to_lowercase()
}

/// Process-wide blacklist handle.
///
/// Readers share the lock; each add/remove/clear holds the write lock across
/// its modify-and-persist window, so concurrent writers never lose updates.
#[derive(Debug)]
pub struct BlacklistStore {
    path: PathBuf,
    state: RwLock<Blacklist>,
}

impl BlacklistStore {
    /// Open the store, loading whatever is on disk
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Blacklist::load(&path);
        Self {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add(&self, category: &str, address: &str) {
        if address.trim().is_empty() {
            warn!("Attempted to add empty address to blacklist");
            return;
        }
        let Some(category) = Self::category(category) else {
            return;
        };

        let mut guard = self.write();
        guard.set_mut(category).insert(normalize(address));
        self.persist(&guard);
        info!("🚫 Added {} to {} blacklist", address, category);
    }

    /// Removing a non-member is a silent no-op (the file is still rewritten)
    pub fn remove(&self, category: &str, address: &str) {
        let Some(category) = Self::category(category) else {
            return;
        };

        let mut guard = self.write();
        guard.set_mut(category).remove(&normalize(address));
        self.persist(&guard);
        info!("Removed {} from {} blacklist", address, category);
    }

    pub fn contains(&self, category: &str, address: &str) -> bool {
        match Self::category(category) {
            Some(category) => self.read().contains(category, address),
            None => false,
        }
    }

    /// Unknown categories are ignored without a warning
    pub fn clear(&self, category: &str) {
        let Some(category) = BlacklistCategory::parse(category) else {
            return;
        };

        let mut guard = self.write();
        guard.set_mut(category).clear();
        self.persist(&guard);
        info!("🧹 Cleared {} blacklist", category);
    }

    /// Copy of one category; unknown categories yield an empty set
    pub fn get(&self, category: &str) -> BTreeSet<String> {
        BlacklistCategory::parse(category)
            .map(|category| self.read().set(category).clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Blacklist {
        self.read().clone()
    }

    fn category(name: &str) -> Option<BlacklistCategory> {
        let category = BlacklistCategory::parse(name);
        if category.is_none() {
            warn!("Invalid blacklist type: {}", name);
        }
        category
    }

    fn persist(&self, blacklist: &Blacklist) {
        match blacklist.write_to(&self.path) {
            Ok(()) => debug!("Blacklists saved to {}", self.path.display()),
            Err(e) => error!("❌ Error saving blacklists: {}", e),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Blacklist> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Blacklist> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
