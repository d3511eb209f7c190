//! Group registry (`bot_groups.json`)
//!
//! Maps group id (as a string, for JSON keys) to display name. Saved after
//! every change so the broadcast bot finds its targets again after a restart.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// One broadcast destination.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupTarget {
    pub id: i64,
    pub title: String,
}

impl std::fmt::Display for GroupTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.title, self.id)
    }
}

#[derive(Debug, Clone)]
pub struct GroupRegistry {
    path: PathBuf,
    groups: BTreeMap<String, String>,
}

impl GroupRegistry {
    /// Load the registry, starting empty when the file is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let groups = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self { path, groups }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.groups.contains_key(&id.to_string())
    }

    /// Insert or rename a group, then persist.
    pub fn add(&mut self, id: i64, title: impl Into<String>) -> Result<()> {
        self.groups.insert(id.to_string(), title.into());
        self.save()
    }

    /// Remove a group and persist. Returns whether it was present.
    pub fn remove(&mut self, id: i64) -> Result<bool> {
        let removed = self.groups.remove(&id.to_string()).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Drop several groups with one write.
    pub fn remove_all(&mut self, ids: &[i64]) -> Result<usize> {
        let before = self.groups.len();
        for id in ids {
            self.groups.remove(&id.to_string());
        }
        let removed = before - self.groups.len();
        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Targets in id order. Keys that are not numeric are skipped.
    pub fn targets(&self) -> Vec<GroupTarget> {
        self.groups
            .iter()
            .filter_map(|(id, title)| {
                id.parse::<i64>().ok().map(|id| GroupTarget {
                    id,
                    title: title.clone(),
                })
            })
            .collect()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.groups.values().map(String::as_str)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.groups)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}
