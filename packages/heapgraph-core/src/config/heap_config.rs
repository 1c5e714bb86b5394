//! Heap reconstruction configuration
//!
//! Every knob has a named default coming from a [`Preset`]. Callers adjust
//! individual settings with the builder-style setters and call
//! [`HeapConfig::validate`] (done automatically by `HeapGraph::open`).

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;

/// Configuration for segment caching, compression and loader attribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapConfig {
    /// Accumulated record cost after which a segment is closed (100..=10000000)
    pub segment_budget: u64,

    /// References per cost unit for reference-bearing records (1..=1024)
    pub reference_cost_scale: u64,

    /// Segment payloads kept materialized at once (1..=100000)
    pub max_cached_segments: usize,

    /// Reader positions kept open for resuming replays (1..=64)
    pub reader_pool_size: usize,

    /// First sweep materializes segments without references
    pub lazy_references: bool,

    /// Store reference lists as compressed indices when possible
    pub compress_references: bool,

    /// Name of the class every class loader derives from
    pub class_loader_class: String,

    /// Name suffixes that mark a loader when inheritance data is missing
    pub loader_name_suffixes: Vec<String>,

    /// Root of the class hierarchy
    pub root_class_name: String,

    /// Class of on-heap class mirrors
    pub class_class_name: String,

    /// Package prefix counted for boot-namespace promotion
    pub core_package_prefix: String,

    /// Core-package classes a namespace must own to be promoted to boot (1..=100000)
    pub boot_promotion_threshold: usize,

    /// Merge the companion snapshot into loader attribution when present
    pub companion_merge: bool,
}

impl HeapConfig {
    /// Create config from preset
    pub fn from_preset(preset: Preset) -> Self {
        let (segment_budget, max_cached_segments, reader_pool_size, lazy_references) =
            match preset {
                Preset::Compact => (2_000, 8, 2, true),
                Preset::Balanced => (10_000, 32, 4, true),
                Preset::Thorough => (50_000, 256, 8, false),
            };

        Self {
            segment_budget,
            reference_cost_scale: 4,
            max_cached_segments,
            reader_pool_size,
            lazy_references,
            compress_references: true,
            class_loader_class: "java/lang/ClassLoader".to_string(),
            loader_name_suffixes: vec!["ClassLoader".to_string(), "Loader".to_string()],
            root_class_name: "java/lang/Object".to_string(),
            class_class_name: "java/lang/Class".to_string(),
            core_package_prefix: "java/lang/".to_string(),
            boot_promotion_threshold: 5,
            companion_merge: true,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.segment_budget < 100 || self.segment_budget > 10_000_000 {
            return Err(ConfigError::range_with_hint(
                "segment_budget",
                self.segment_budget,
                100,
                10_000_000,
                "A segment must hold at least ten records",
            ));
        }

        if self.reference_cost_scale == 0 || self.reference_cost_scale > 1024 {
            return Err(ConfigError::range_with_hint(
                "reference_cost_scale",
                self.reference_cost_scale,
                1,
                1024,
                "Scale divides the reference count of each record",
            ));
        }

        if self.max_cached_segments == 0 || self.max_cached_segments > 100_000 {
            return Err(ConfigError::range_with_hint(
                "max_cached_segments",
                self.max_cached_segments,
                1,
                100_000,
                "The cache must hold at least the segment being iterated",
            ));
        }

        if self.reader_pool_size == 0 || self.reader_pool_size > 64 {
            return Err(ConfigError::range_with_hint(
                "reader_pool_size",
                self.reader_pool_size,
                1,
                64,
                "At least one reader position is needed",
            ));
        }

        if self.boot_promotion_threshold == 0 || self.boot_promotion_threshold > 100_000 {
            return Err(ConfigError::range_with_hint(
                "boot_promotion_threshold",
                self.boot_promotion_threshold,
                1,
                100_000,
                "A zero threshold would promote any namespace",
            ));
        }

        for (field, value) in [
            ("class_loader_class", &self.class_loader_class),
            ("root_class_name", &self.root_class_name),
            ("class_class_name", &self.class_class_name),
            ("core_package_prefix", &self.core_package_prefix),
        ] {
            if value.is_empty() {
                return Err(ConfigError::empty(
                    field,
                    "Class names use the internal slash form, e.g. java/lang/Object",
                ));
            }
        }

        Ok(())
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize configuration to YAML
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builder: Set segment budget
    pub fn segment_budget(mut self, v: u64) -> Self {
        self.segment_budget = v;
        self
    }

    /// Builder: Set reference cost scale
    pub fn reference_cost_scale(mut self, v: u64) -> Self {
        self.reference_cost_scale = v;
        self
    }

    /// Builder: Set cached segment limit
    pub fn max_cached_segments(mut self, v: usize) -> Self {
        self.max_cached_segments = v;
        self
    }

    /// Builder: Set reader pool size
    pub fn reader_pool_size(mut self, v: usize) -> Self {
        self.reader_pool_size = v;
        self
    }

    /// Builder: Toggle lazy reference materialization
    pub fn lazy_references(mut self, v: bool) -> Self {
        self.lazy_references = v;
        self
    }

    /// Builder: Toggle reference compression
    pub fn compress_references(mut self, v: bool) -> Self {
        self.compress_references = v;
        self
    }

    /// Builder: Set boot promotion threshold
    pub fn boot_promotion_threshold(mut self, v: usize) -> Self {
        self.boot_promotion_threshold = v;
        self
    }

    /// Builder: Toggle companion snapshot merge
    pub fn companion_merge(mut self, v: bool) -> Self {
        self.companion_merge = v;
        self
    }

    /// Builder: Set the class every loader derives from
    pub fn class_loader_class(mut self, v: impl Into<String>) -> Self {
        self.class_loader_class = v.into();
        self
    }

    /// Builder: Set the class-of-classes name
    pub fn class_class_name(mut self, v: impl Into<String>) -> Self {
        self.class_class_name = v.into();
        self
    }

    /// Builder: Set the core package prefix
    pub fn core_package_prefix(mut self, v: impl Into<String>) -> Self {
        self.core_package_prefix = v.into();
        self
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}
