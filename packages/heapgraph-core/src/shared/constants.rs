//! Centralized constants
//!
//! Record costs, primitive element widths and sentinel names.

/// Segment cost model
pub mod cost {
    /// Flat cost of any materialized record
    pub const RECORD_BASE_COST: u64 = 10;

    /// Primitive arrays carry no references, so they cost the flat amount only
    pub const PRIMITIVE_ARRAY_COST: u64 = 10;
}

/// Header versions the reconstruction layer understands
pub mod format {
    pub const MIN_SUPPORTED_VERSION: u32 = 4;
    pub const MAX_SUPPORTED_VERSION: u32 = 6;
}

/// Width of a reference slot when estimating object-array sizes
pub const REFERENCE_WIDTH: u64 = 8;

/// Display names of the class-name sentinels
pub mod sentinel_names {
    pub const UNKNOWN_ARRAY: &str = "[<unknown element>";
    pub const UNKNOWN_NON_ARRAY: &str = "<unknown class>";
    pub const UNKNOWN_ARRAY_TYPE: &str = "[<unknown array type>";
}

/// Walk limit for superclass chains in corrupt dumps
pub const MAX_HIERARCHY_DEPTH: usize = 256;
