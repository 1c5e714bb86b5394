//! Companion process snapshot
//!
//! Independently produced description of the same process: class loaders with
//! the classes they define, threads, and monitors. Only the loader section
//! feeds attribution; threads and monitors are passed through to callers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{HeapError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionSnapshot {
    pub loaders: Vec<SnapshotLoader>,
    pub threads: Vec<SnapshotThread>,
    pub monitors: Vec<SnapshotMonitor>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotLoader {
    /// On-heap loader object; `None` for the bootstrap loader
    pub object_address: Option<u64>,
    /// Class of the loader object
    pub type_address: Option<u64>,
    pub type_name: Option<String>,
    pub classes: Vec<SnapshotClass>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotClass {
    pub address: Option<u64>,
    pub name: String,
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotThread {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub object_address: Option<u64>,
    pub frames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotMonitor {
    pub object_address: u64,
    pub owner_thread: Option<u64>,
    pub waiting_threads: Vec<u64>,
}

impl CompanionSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| HeapError::companion(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn class_count(&self) -> usize {
        self.loaders.iter().map(|loader| loader.classes.len()).sum()
    }

    pub fn thread(&self, id: u64) -> Option<&SnapshotThread> {
        self.threads.iter().find(|thread| thread.id == id)
    }

    pub fn monitor_for(&self, object_address: u64) -> Option<&SnapshotMonitor> {
        self.monitors
            .iter()
            .find(|monitor| monitor.object_address == object_address)
    }
}
