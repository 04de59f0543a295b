// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Deterministic service table for host tests.
//!
//! Models the firmware behaviors the handoff protocol must survive: map
//! growth caused by the loader's own allocation, transient fetch
//! failures, stale map keys, and broken-firmware invariant violations.
//!
//! A generation counter stands in for the firmware's internal allocation
//! state. Every allocate and free advances it, a successful fetch stamps
//! it into the returned key, and the transition call rejects any key that
//! no longer matches. Fault scripts arm one behavior each and disarm
//! themselves as they fire, so a test reads as "arrange, run, count".

#![allow(unsafe_code)] // Byte views into the word-aligned backing store
#![allow(clippy::panic)] // Test infrastructure - panicking on invalid use is correct

use crate::table::ServiceTable;
use orla_efi::{
    DESCRIPTOR_VERSION, ImageHandle, MapKey, MemoryClass, MemoryMapMeta, Status,
};

/// Pool buffer handed out by [`MockServiceTable`].
///
/// Backed by `u64` words so the natural start address is 8-byte aligned;
/// a scripted misalignment shifts the byte view one past the boundary.
#[derive(Debug)]
pub struct MockPool {
    storage: Box<[u64]>,
    offset: usize,
    len: usize,
}

impl MockPool {
    fn new(len: usize, misaligned: bool) -> Self {
        let offset = usize::from(misaligned);
        let words = (len + offset).div_ceil(8).max(1);
        Self {
            storage: vec![0u64; words].into_boxed_slice(),
            offset,
            len,
        }
    }

    /// Usable length of the buffer in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks for a zero-length buffer.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for MockPool {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: the words are one live allocation and new() sized them
        // to cover offset + len bytes.
        unsafe {
            core::slice::from_raw_parts(
                self.storage.as_ptr().cast::<u8>().add(self.offset),
                self.len,
            )
        }
    }
}

impl AsMut<[u8]> for MockPool {
    fn as_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, with exclusive access through &mut self.
        unsafe {
            core::slice::from_raw_parts_mut(
                self.storage.as_mut_ptr().cast::<u8>().add(self.offset),
                self.len,
            )
        }
    }
}

/// Reads the per-record tag [`MockServiceTable`] stamps into each
/// descriptor record it writes.
#[must_use]
pub fn record_tag(record: &[u8]) -> u64 {
    let mut tag = [0u8; 8];
    let head = record.len().min(8);
    tag[..head].copy_from_slice(&record[..head]);
    u64::from_le_bytes(tag)
}

/// Fills one opaque descriptor record with its index tag.
fn fill_record(record: &mut [u8], index: usize) {
    record.fill(0);
    let tag = (index as u64).to_le_bytes();
    let head = record.len().min(8);
    record[..head].copy_from_slice(&tag[..head]);
}

/// Deterministic service table driving the protocol tests.
///
/// `new(descriptor_count, desc_size)` models firmware whose map is
/// `descriptor_count` records of `desc_size` bytes. Call counters track
/// every operation; `allocate_calls` counts successful allocations only,
/// so `live_allocations` is exact.
pub struct MockServiceTable {
    descriptor_count: usize,
    desc_size: usize,
    generation: u64,
    available: bool,
    exited: bool,

    // Fault scripts
    pending_growth: usize,
    fetch_failures_left: u32,
    probe_override: Option<Status>,
    allocations_denied: bool,
    allocations_misaligned: bool,
    ragged_extra: usize,
    stale_exits_left: u32,

    // Observability
    probes: u32,
    fetches: u32,
    allocs: u32,
    frees: u32,
    exits: u32,
    last_alloc_size: usize,
}

impl MockServiceTable {
    /// Creates firmware with `descriptor_count` records of `desc_size`
    /// bytes each.
    #[must_use]
    pub const fn new(descriptor_count: usize, desc_size: usize) -> Self {
        Self {
            descriptor_count,
            desc_size,
            generation: 1,
            available: true,
            exited: false,
            pending_growth: 0,
            fetch_failures_left: 0,
            probe_override: None,
            allocations_denied: false,
            allocations_misaligned: false,
            ragged_extra: 0,
            stale_exits_left: 0,
            probes: 0,
            fetches: 0,
            allocs: 0,
            frees: 0,
            exits: 0,
            last_alloc_size: 0,
        }
    }

    // =========================================================================
    // Fault scripts
    // =========================================================================

    /// The next allocation grows the map by `extra` descriptors, as a
    /// real allocation can when it splits a region.
    pub const fn grow_once(&mut self, extra: usize) {
        self.pending_growth = extra;
    }

    /// The next `count` fetches fail with `DEVICE_ERROR`.
    pub const fn fail_fetches(&mut self, count: u32) {
        self.fetch_failures_left = count;
    }

    /// Probes return `status` instead of refusing with the too-small
    /// signal.
    pub const fn refuse_probe(&mut self, status: Status) {
        self.probe_override = Some(status);
    }

    /// Allocations fail with `OUT_OF_RESOURCES`.
    pub const fn deny_allocations(&mut self) {
        self.allocations_denied = true;
    }

    /// Pool buffers start one byte past an 8-byte boundary.
    pub const fn misalign_allocations(&mut self) {
        self.allocations_misaligned = true;
    }

    /// Fetches report `extra` bytes beyond a whole number of records.
    pub const fn pad_fetch_size(&mut self, extra: usize) {
        self.ragged_extra = extra;
    }

    /// The next `count` transition attempts find the generation advanced
    /// by firmware-internal activity (stale key).
    pub const fn drift_before_exit(&mut self, count: u32) {
        self.stale_exits_left = count;
    }

    /// The boot-services environment reports itself gone.
    pub const fn mark_unavailable(&mut self) {
        self.available = false;
    }

    // =========================================================================
    // Observability
    // =========================================================================

    /// Number of size probes served.
    #[must_use]
    pub const fn probe_calls(&self) -> u32 {
        self.probes
    }

    /// Number of real fetches served.
    #[must_use]
    pub const fn fetch_calls(&self) -> u32 {
        self.fetches
    }

    /// Number of successful pool allocations.
    #[must_use]
    pub const fn allocate_calls(&self) -> u32 {
        self.allocs
    }

    /// Number of pool frees.
    #[must_use]
    pub const fn free_calls(&self) -> u32 {
        self.frees
    }

    /// Number of transition attempts.
    #[must_use]
    pub const fn exit_calls(&self) -> u32 {
        self.exits
    }

    /// Pool allocations not yet freed. A buffer surrendered to a
    /// successful transition is never freed and stays counted here.
    #[must_use]
    pub const fn live_allocations(&self) -> u32 {
        self.allocs - self.frees
    }

    /// Size of the most recent successful allocation in bytes.
    #[must_use]
    pub const fn last_allocation_size(&self) -> usize {
        self.last_alloc_size
    }

    /// Whether a transition attempt has succeeded.
    #[must_use]
    pub const fn has_exited(&self) -> bool {
        self.exited
    }

    fn assert_alive(&self, operation: &str) {
        assert!(
            !self.exited,
            "{operation} called after boot services exited"
        );
    }

    const fn map_bytes(&self) -> usize {
        self.descriptor_count * self.desc_size
    }

    fn write_size_scalars(&self, meta: &mut MemoryMapMeta) {
        meta.map_size = self.map_bytes();
        meta.desc_size = self.desc_size;
        meta.desc_version = DESCRIPTOR_VERSION;
    }
}

impl ServiceTable for MockServiceTable {
    type Pool = MockPool;

    fn is_available(&self) -> bool {
        self.available && !self.exited
    }

    fn memory_map(&mut self, buffer: Option<&mut MockPool>, meta: &mut MemoryMapMeta) -> Status {
        self.assert_alive("memory_map");
        let Some(pool) = buffer else {
            self.probes += 1;
            if let Some(status) = self.probe_override {
                return status;
            }
            self.write_size_scalars(meta);
            return Status::BUFFER_TOO_SMALL;
        };

        self.fetches += 1;
        if self.fetch_failures_left > 0 {
            self.fetch_failures_left -= 1;
            return Status::DEVICE_ERROR;
        }
        if pool.len() < self.map_bytes() {
            self.write_size_scalars(meta);
            return Status::BUFFER_TOO_SMALL;
        }

        let stride = self.desc_size;
        let bytes = pool.as_mut();
        for index in 0..self.descriptor_count {
            let start = index * stride;
            fill_record(&mut bytes[start..start + stride], index);
        }
        self.write_size_scalars(meta);
        meta.map_size += self.ragged_extra;
        meta.map_key = MapKey::new(self.generation);
        Status::SUCCESS
    }

    fn allocate_pool(&mut self, class: MemoryClass, size: usize) -> Result<MockPool, Status> {
        self.assert_alive("allocate_pool");
        assert_eq!(
            class,
            MemoryClass::LOADER_DATA,
            "map buffers must be loader data"
        );
        if self.allocations_denied {
            return Err(Status::OUT_OF_RESOURCES);
        }

        self.allocs += 1;
        self.last_alloc_size = size;
        // Allocating alters the firmware's memory state
        self.generation += 1;
        if self.pending_growth > 0 {
            self.descriptor_count += self.pending_growth;
            self.pending_growth = 0;
        }
        Ok(MockPool::new(size, self.allocations_misaligned))
    }

    fn free_pool(&mut self, pool: MockPool) {
        self.assert_alive("free_pool");
        self.frees += 1;
        self.generation += 1;
        drop(pool);
    }

    fn exit_boot_services(&mut self, image: ImageHandle, key: MapKey) -> Status {
        self.assert_alive("exit_boot_services");
        self.exits += 1;
        if image.is_null() {
            return Status::INVALID_PARAMETER;
        }
        if self.stale_exits_left > 0 {
            self.stale_exits_left -= 1;
            // Firmware-internal housekeeping advanced the state
            self.generation += 1;
        }
        if key.as_u64() != self.generation {
            return Status::INVALID_PARAMETER;
        }
        self.exited = true;
        Status::SUCCESS
    }
}
