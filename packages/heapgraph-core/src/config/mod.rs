//! Configuration system
//!
//! Two tiers:
//! - Preset: `HeapConfig::from_preset(Preset::Compact)`
//! - Override: builder setters or a YAML file for complete control
//!
//! # Examples
//!
//! ```rust,ignore
//! use heapgraph_core::config::{HeapConfig, Preset};
//!
//! let config = HeapConfig::from_preset(Preset::Compact)
//!     .max_cached_segments(4)
//!     .lazy_references(false);
//! config.validate()?;
//!
//! let config = HeapConfig::from_yaml("heapgraph.yaml")?;
//! ```

pub mod error;
pub mod heap_config;
pub mod preset;

pub use error::{ConfigError, ConfigResult};
pub use heap_config::HeapConfig;
pub use preset::Preset;
