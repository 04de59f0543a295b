// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Opaque firmware handle and token newtypes.
//!
//! These newtypes prevent accidentally mixing the loaded-image handle with
//! the memory-map validity key, two unrelated machine words the transition
//! call takes side by side.

use core::fmt;

/// Handle of the loaded image that owns the boot-services environment.
///
/// The firmware passes this to the loader's entry point; the transition
/// call requires it back to prove the caller is the image the firmware
/// started. A null handle never identifies a loaded image.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ImageHandle(u64);

impl ImageHandle {
    /// Creates an image handle from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Creates the null handle.
    #[inline]
    #[must_use]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the raw handle value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageHandle({:#x})", self.0)
    }
}

/// Validity token for one memory-map measurement.
///
/// The firmware stamps a key into every fetched map. The key matches the
/// firmware's internal allocation state at the moment of the fetch and is
/// invalidated by any later call that can alter that state, including the
/// allocation of the map buffer itself. The transition call consumes a key
/// and fails when it is stale.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct MapKey(u64);

impl MapKey {
    /// Creates a map key from its raw value.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapKey({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_null() {
        assert!(ImageHandle::null().is_null());
        assert!(ImageHandle::default().is_null());
        assert!(!ImageHandle::new(0x8000_1000).is_null());
    }

    #[test]
    fn handle_roundtrip() {
        let handle = ImageHandle::new(0xDEAD_BEEF);
        assert_eq!(handle.as_u64(), 0xDEAD_BEEF);
        assert_eq!(format!("{handle:?}"), "ImageHandle(0xdeadbeef)");
    }

    #[test]
    fn map_keys_compare_by_value() {
        assert_eq!(MapKey::new(7), MapKey::new(7));
        assert_ne!(MapKey::new(7), MapKey::new(8));
        assert_eq!(format!("{:?}", MapKey::new(0x10)), "MapKey(0x10)");
    }
}
