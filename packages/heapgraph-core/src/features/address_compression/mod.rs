//! Address compression
//!
//! Sparse 64-bit heap addresses mapped onto dense `u32` indices so reference
//! lists take half the memory.

mod compressor;
mod ref_list;

pub use compressor::{AddressBands, AddressCompressor, NULL_INDEX};
pub use ref_list::RefList;
