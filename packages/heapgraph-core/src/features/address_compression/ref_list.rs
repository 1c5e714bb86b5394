//! Compact reference lists
//!
//! A list is stored as compressed `u32` indices when every address in it
//! round-trips through the compressor, and as wide `u64` addresses otherwise.
//! Null slots always round-trip. The choice is per list: one stray address
//! only widens its own list.

use super::compressor::AddressCompressor;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RefList {
    #[default]
    Absent,
    Compressed(Box<[u32]>),
    Wide(Box<[u64]>),
}

impl RefList {
    pub fn encode(addresses: &[u64], compressor: &AddressCompressor) -> Self {
        if addresses.is_empty() {
            return RefList::Absent;
        }

        let compressed: Option<Vec<u32>> = addresses
            .iter()
            .map(|&address| compressor.try_compress(address))
            .collect();

        match compressed {
            Some(indices) => RefList::Compressed(indices.into_boxed_slice()),
            None => RefList::Wide(addresses.to_vec().into_boxed_slice()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RefList::Absent => 0,
            RefList::Compressed(indices) => indices.len(),
            RefList::Wide(addresses) => addresses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, RefList::Compressed(_))
    }

    pub fn get(&self, position: usize, compressor: &AddressCompressor) -> Option<u64> {
        match self {
            RefList::Absent => None,
            RefList::Compressed(indices) => {
                indices.get(position).map(|&index| compressor.expand(index))
            }
            RefList::Wide(addresses) => addresses.get(position).copied(),
        }
    }

    /// All addresses in original order
    pub fn addresses(&self, compressor: &AddressCompressor) -> Vec<u64> {
        match self {
            RefList::Absent => Vec::new(),
            RefList::Compressed(indices) => indices
                .iter()
                .map(|&index| compressor.expand(index))
                .collect(),
            RefList::Wide(addresses) => addresses.to_vec(),
        }
    }
}
