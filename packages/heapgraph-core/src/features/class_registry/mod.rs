//! Class registries
//!
//! One [`ClassRegistry`] per class-loader namespace, held together by the
//! [`ClassDirectory`]. The initial scan builds a single registry through
//! [`RegistryBuilder`], synthesizing every class the dump leaves out.

mod builder;
mod directory;
pub mod domain;
mod registry;

pub use builder::{ArrayConvention, RegistryBuilder, ScanClasses};
pub use directory::{ClassDirectory, ClassLoaderNamespace, NamespaceSummary};
pub use domain::{
    array_name_for, ClassName, ClassRecord, Component, InstanceSize, PrimitiveType, SuperRef,
};
pub use registry::{ClassRegistry, NameLookup};
