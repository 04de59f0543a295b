// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Firmware service-table abstraction.
//!
//! The boot-services surface the handoff protocol consumes, as an
//! explicit handle instead of ambient global state. Production binds the
//! trait to the real firmware tables; tests bind it to a deterministic
//! fake. Either way the protocol code is identical.
//!
//! The memory-map call is dual-purpose: with no buffer it is the size
//! probe, which the firmware refuses with [`Status::BUFFER_TOO_SMALL`]
//! while reporting the required size and descriptor scalars; with a
//! buffer it is the real fetch, which fills the buffer and stamps the
//! validity key.

#[cfg(any(test, feature = "std"))]
mod mock;
#[cfg(feature = "uefi")]
mod uefi;

#[cfg(any(test, feature = "std"))]
pub use mock::{MockPool, MockServiceTable, record_tag};
#[cfg(feature = "uefi")]
pub use uefi::{UefiPool, UefiServiceTable};

use orla_efi::{ImageHandle, MapKey, MemoryClass, MemoryMapMeta, Status};

/// Boot-services operations the handoff protocol consumes.
///
/// Pool buffers are exclusively owned: a buffer returned by
/// [`ServiceTable::allocate_pool`] is either given back through
/// [`ServiceTable::free_pool`] or surrendered by a successful transition,
/// never both.
pub trait ServiceTable {
    /// Buffer handed out by the pool allocator.
    type Pool: AsRef<[u8]> + AsMut<[u8]>;

    /// Checks that the boot-services environment still exists.
    fn is_available(&self) -> bool;

    /// Measures (no buffer) or fetches (with buffer) the memory map.
    ///
    /// The probe form must refuse with [`Status::BUFFER_TOO_SMALL`] and
    /// write the required size, stride, and version into `meta`. The
    /// fetch form fills the buffer and writes all four scalars including
    /// the validity key; it may itself refuse with the too-small signal
    /// when the map grew past the buffer since the probe.
    fn memory_map(&mut self, buffer: Option<&mut Self::Pool>, meta: &mut MemoryMapMeta) -> Status;

    /// Allocates a pool buffer of at least `size` bytes.
    ///
    /// Advances the firmware's allocation state: every map key measured
    /// before this call is stale afterwards.
    ///
    /// # Errors
    ///
    /// Returns the firmware status when the pool cannot satisfy the
    /// request.
    fn allocate_pool(&mut self, class: MemoryClass, size: usize) -> Result<Self::Pool, Status>;

    /// Returns a pool buffer to the firmware.
    ///
    /// Advances the allocation state like [`ServiceTable::allocate_pool`].
    fn free_pool(&mut self, pool: Self::Pool);

    /// The one-shot transition that ends boot services.
    ///
    /// Succeeds only when `key` matches the firmware's current allocation
    /// state. After success the environment behind this table no longer
    /// exists and no further operation on it is legal.
    fn exit_boot_services(&mut self, image: ImageHandle, key: MapKey) -> Status;
}
