// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory-map metadata and pool allocation classes.
//!
//! A fetched memory map is a run of fixed-stride descriptor records plus
//! four scalars describing the run. Orla transports the records as opaque
//! bytes; only the scalars defined here are ever interpreted.

use crate::handle::MapKey;
use core::fmt;

/// Required alignment of a memory-map buffer, in bytes.
///
/// Descriptor records begin with a 64-bit field, so the firmware hands out
/// map buffers on 8-byte boundaries. A buffer that violates this indicates
/// a corrupted allocator, not a transient condition.
pub const DESCRIPTOR_ALIGN: usize = 8;

/// Descriptor format version this loader understands.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Checks whether an address satisfies [`DESCRIPTOR_ALIGN`].
#[inline]
#[must_use]
pub const fn is_descriptor_aligned(addr: usize) -> bool {
    addr % DESCRIPTOR_ALIGN == 0
}

/// Class of memory requested from the firmware pool allocator.
///
/// The class tags the allocation in the memory map itself, telling the OS
/// which regions belonged to the loader and may be reclaimed after boot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MemoryClass(u32);

impl MemoryClass {
    /// Code of the loaded image.
    pub const LOADER_CODE: Self = Self(1);

    /// Data of the loaded image, including memory-map buffers.
    pub const LOADER_DATA: Self = Self(2);

    /// Creates a memory class from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw class value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Scalars describing one memory-map measurement.
///
/// The firmware writes these as side outputs of the map call: the size
/// probe fills everything but the key, a successful fetch fills all four.
/// `desc_size` is the record stride and may exceed the logical record
/// size; consumers must step by the stride, never by a compiled-in record
/// layout.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryMapMeta {
    /// Total size of the descriptor run in bytes.
    pub map_size: usize,

    /// Validity token of this measurement.
    pub map_key: MapKey,

    /// Stride between consecutive descriptor records in bytes.
    pub desc_size: usize,

    /// Descriptor format version.
    pub desc_version: u32,
}

impl MemoryMapMeta {
    /// Returns the number of whole descriptor records in the run.
    #[inline]
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        if self.desc_size == 0 {
            return 0;
        }
        self.map_size / self.desc_size
    }

    /// Checks that the run is a whole number of records with a usable
    /// stride.
    #[inline]
    #[must_use]
    pub const fn is_whole_records(&self) -> bool {
        self.desc_size != 0 && self.map_size % self.desc_size == 0
    }
}

impl fmt::Debug for MemoryMapMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMapMeta")
            .field("map_size", &self.map_size)
            .field("map_key", &self.map_key)
            .field("desc_size", &self.desc_size)
            .field("desc_version", &self.desc_version)
            .finish()
    }
}

// Compile-time verification of the alignment constant
const _: () = {
    assert!(DESCRIPTOR_ALIGN.is_power_of_two());
    assert!(is_descriptor_aligned(0));
    assert!(!is_descriptor_aligned(4));
};
