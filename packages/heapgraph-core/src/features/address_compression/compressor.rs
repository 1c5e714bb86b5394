//! Two-band address compressor
//!
//! Heap dumps place objects and classes in (possibly overlapping) address
//! ranges. Addresses are aligned, so the low bits shared by every observed
//! address carry no information. The compressor maps an address onto a dense
//! `u32` index:
//!
//! ```text
//! band 1: [min(minObj, minCls), min(maxObj, maxCls)]   index 0 ..
//! band 2: the remaining higher range                    index band1_count ..
//! index = ((addr - base) >> shift) + index_base
//! ```
//!
//! Bands are fixed by [`AddressCompressor::freeze`] once both ranges are known
//! (end of the first pass). An address outside what was observed may not
//! round-trip; [`AddressCompressor::try_compress`] detects that. The null
//! reference always maps to [`NULL_INDEX`], which no band ever issues.

use tracing::debug;

/// Index of the null reference
pub const NULL_INDEX: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBands {
    pub low_base: u64,
    pub low_top: u64,
    pub low_count: u64,
    pub high_base: u64,
    pub high_count: u64,
    pub shift: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AddressCompressor {
    object_range: Option<(u64, u64)>,
    class_range: Option<(u64, u64)>,
    or_bits: u64,
    bands: Option<AddressBands>,
}

fn widen(range: &mut Option<(u64, u64)>, address: u64) {
    *range = Some(match *range {
        Some((low, high)) => (low.min(address), high.max(address)),
        None => (address, address),
    });
}

impl AddressCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an object address. Ignored once the bands are fixed.
    pub fn observe_object(&mut self, address: u64) {
        if self.bands.is_none() {
            widen(&mut self.object_range, address);
            self.or_bits |= address;
        }
    }

    /// Record a class address. Ignored once the bands are fixed.
    pub fn observe_class(&mut self, address: u64) {
        if self.bands.is_none() {
            widen(&mut self.class_range, address);
            self.or_bits |= address;
        }
    }

    pub fn object_range(&self) -> Option<(u64, u64)> {
        self.object_range
    }

    pub fn class_range(&self) -> Option<(u64, u64)> {
        self.class_range
    }

    /// Fix the bands. Returns whether compression is now enabled.
    ///
    /// Stays disabled when either range was never observed or when the
    /// combined index range does not fit below [`NULL_INDEX`].
    pub fn freeze(&mut self) -> bool {
        if self.bands.is_some() {
            return true;
        }
        let (Some((min_obj, max_obj)), Some((min_cls, max_cls))) =
            (self.object_range, self.class_range)
        else {
            debug!("address compression disabled: object or class range unknown");
            return false;
        };

        let shift = if self.or_bits == 0 {
            0
        } else {
            self.or_bits.trailing_zeros().min(63)
        };
        let granule = 1u64 << shift;

        let low_base = min_obj.min(min_cls);
        let low_top = max_obj.min(max_cls);
        let low_count = ((low_top - low_base) >> shift) + 1;

        let overall_top = max_obj.max(max_cls);
        let high_base = min_obj.max(min_cls).max(low_top.saturating_add(granule));
        let high_count = if overall_top > low_top && overall_top >= high_base {
            ((overall_top - high_base) >> shift) + 1
        } else {
            0
        };

        if low_count + high_count > u64::from(NULL_INDEX) {
            debug!(
                "address compression disabled: {} indices exceed u32",
                low_count + high_count
            );
            return false;
        }

        let bands = AddressBands {
            low_base,
            low_top,
            low_count,
            high_base,
            high_count,
            shift,
        };
        debug!(?bands, "address compression enabled");
        self.bands = Some(bands);
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.bands.is_some()
    }

    pub fn bands(&self) -> Option<&AddressBands> {
        self.bands.as_ref()
    }

    /// Map an address to its index. Only meaningful for addresses observed
    /// while the bands were fixed; use [`Self::try_compress`] otherwise.
    pub fn compress(&self, address: u64) -> u32 {
        match &self.bands {
            Some(_) if address == 0 => NULL_INDEX,
            Some(bands) if address <= bands.low_top => {
                (address.wrapping_sub(bands.low_base) >> bands.shift) as u32
            }
            Some(bands) => {
                ((address.wrapping_sub(bands.high_base) >> bands.shift)
                    .wrapping_add(bands.low_count)) as u32
            }
            None => address as u32,
        }
    }

    pub fn expand(&self, index: u32) -> u64 {
        if index == NULL_INDEX && self.bands.is_some() {
            return 0;
        }
        let index = u64::from(index);
        match &self.bands {
            Some(bands) if index < bands.low_count => {
                bands.low_base.wrapping_add(index << bands.shift)
            }
            Some(bands) => bands
                .high_base
                .wrapping_add((index - bands.low_count) << bands.shift),
            None => index,
        }
    }

    /// Compress only if the address survives the round trip
    pub fn try_compress(&self, address: u64) -> Option<u32> {
        if !self.is_enabled() {
            return None;
        }
        let index = self.compress(address);
        (self.expand(index) == address).then_some(index)
    }
}
