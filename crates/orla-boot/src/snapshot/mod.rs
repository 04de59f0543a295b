// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory map snapshot with compile-time freshness.
//!
//! A map key is only as good as the last service call: any allocation or
//! free after the fetch silently invalidates it. [`MemoryMapSnapshot`]
//! turns that firmware rule into a borrow rule by holding the service
//! table mutably for its whole lifetime. While a snapshot exists, no
//! other service call can be made through the same table, so the key it
//! carries cannot go stale behind our back. The only remaining race is
//! firmware-internal activity, which [`commit`](MemoryMapSnapshot::commit)
//! reports as a status for the caller to retry.
//!
//! A snapshot ends in one of two ways:
//!
//! 1. Dropped: the pool buffer goes back to firmware via `free_pool`.
//! 2. Committed successfully: the buffer is surrendered on purpose and
//!    lives on as an [`OwnedMemoryMap`], because after the transition
//!    there is no service left to free it with.

#![allow(unsafe_code)] // Manual field moves out of a Drop type

use core::fmt;
use core::mem::ManuallyDrop;
use core::slice::ChunksExact;

use crate::table::ServiceTable;
use orla_efi::{ImageHandle, MapKey, MemoryMapMeta, Status};

/// A validated memory map run tied to the service table it came from.
///
/// Produced by [`MapAcquirer::acquire`](crate::acquire::MapAcquirer::acquire);
/// the run behind [`bytes`](Self::bytes) is already checked for
/// alignment and whole records.
pub struct MemoryMapSnapshot<'t, T: ServiceTable> {
    table: &'t mut T,
    pool: ManuallyDrop<T::Pool>,
    meta: MemoryMapMeta,
}

impl<'t, T: ServiceTable> MemoryMapSnapshot<'t, T> {
    pub(crate) fn new(table: &'t mut T, pool: T::Pool, meta: MemoryMapMeta) -> Self {
        Self {
            table,
            pool: ManuallyDrop::new(pool),
            meta,
        }
    }

    /// Size scalars and key describing the run.
    #[must_use]
    pub const fn meta(&self) -> MemoryMapMeta {
        self.meta
    }

    /// Key identifying this exact revision of the map.
    #[must_use]
    pub const fn map_key(&self) -> MapKey {
        self.meta.map_key
    }

    /// Number of descriptor records in the run.
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        self.meta.descriptor_count()
    }

    /// Byte stride from one record to the next.
    #[must_use]
    pub const fn descriptor_size(&self) -> usize {
        self.meta.desc_size
    }

    /// Firmware's record layout revision.
    #[must_use]
    pub const fn descriptor_version(&self) -> u32 {
        self.meta.desc_version
    }

    /// The descriptor run as raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.pool.as_ref()[..self.meta.map_size]
    }

    /// Iterates the run one opaque record at a time.
    pub fn descriptors(&self) -> ChunksExact<'_, u8> {
        self.bytes().chunks_exact(self.meta.desc_size)
    }

    /// Read-only view of the underlying service table.
    #[must_use]
    pub fn table(&self) -> &T {
        self.table
    }

    /// Exits boot services with this snapshot's key.
    ///
    /// On success the buffer is surrendered to the returned
    /// [`OwnedMemoryMap`] and must never be freed. On failure the
    /// snapshot is discarded, its buffer goes back to firmware, and the
    /// caller decides whether to re-acquire and try again.
    ///
    /// # Errors
    ///
    /// The raw status of the refused transition, `INVALID_PARAMETER`
    /// when the key went stale.
    pub fn commit(self, image: ImageHandle) -> Result<OwnedMemoryMap<T::Pool>, Status> {
        let key = self.map_key();
        let mut this = ManuallyDrop::new(self);
        let status = this.table.exit_boot_services(image, key);
        if status.is_success() {
            // SAFETY: self sits in ManuallyDrop, so its destructor will
            // not run and this is the only extraction of the pool.
            let pool = unsafe { ManuallyDrop::take(&mut this.pool) };
            let meta = this.meta;
            Ok(OwnedMemoryMap { pool, meta })
        } else {
            drop(ManuallyDrop::into_inner(this));
            Err(status)
        }
    }
}

impl<T: ServiceTable> Drop for MemoryMapSnapshot<'_, T> {
    fn drop(&mut self) {
        // SAFETY: drop runs at most once and commit's success path never
        // reaches it, so the pool is still present.
        let pool = unsafe { ManuallyDrop::take(&mut self.pool) };
        self.table.free_pool(pool);
    }
}

impl<T: ServiceTable> fmt::Debug for MemoryMapSnapshot<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMapSnapshot")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// Memory map that outlived the boot-services exit.
///
/// The runtime's copy of the final map. The buffer is firmware-allocated
/// but no longer firmware-owned; there is no service to return it to, so
/// it simply stays resident.
#[derive(Debug)]
pub struct OwnedMemoryMap<P> {
    pool: P,
    meta: MemoryMapMeta,
}

impl<P: AsRef<[u8]>> OwnedMemoryMap<P> {
    /// Size scalars and key describing the run.
    #[must_use]
    pub const fn meta(&self) -> MemoryMapMeta {
        self.meta
    }

    /// Key the transition was committed with.
    #[must_use]
    pub const fn map_key(&self) -> MapKey {
        self.meta.map_key
    }

    /// Number of descriptor records in the run.
    #[must_use]
    pub const fn descriptor_count(&self) -> usize {
        self.meta.descriptor_count()
    }

    /// Byte stride from one record to the next.
    #[must_use]
    pub const fn descriptor_size(&self) -> usize {
        self.meta.desc_size
    }

    /// The descriptor run as raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.pool.as_ref()[..self.meta.map_size]
    }

    /// Iterates the run one opaque record at a time.
    pub fn descriptors(&self) -> ChunksExact<'_, u8> {
        self.bytes().chunks_exact(self.meta.desc_size)
    }

    /// Releases the raw buffer and its size scalars, for handing the map
    /// on to the kernel.
    #[must_use]
    pub fn into_parts(self) -> (P, MemoryMapMeta) {
        (self.pool, self.meta)
    }
}
