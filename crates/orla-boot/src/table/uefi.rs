// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Firmware-backed service table.
//!
//! Thin adapter from the [`ServiceTable`] contract onto the raw boot
//! services function table. All conversions between our fixed-width
//! types and the firmware's pointer-sized ABI happen here and nowhere
//! else. Only compiled with the `uefi` feature.

#![allow(unsafe_code)] // FFI with the firmware function table

use core::ptr::{self, NonNull};

use uefi_raw::table::boot::{BootServices, MemoryDescriptor, MemoryType};
use uefi_raw::table::system::SystemTable;

use crate::table::ServiceTable;
use orla_efi::{ImageHandle, MapKey, MemoryClass, MemoryMapMeta, Status};

/// Pool buffer owned by firmware.
///
/// Carries no destructor on purpose. Returning it to firmware goes
/// through [`ServiceTable::free_pool`]; a buffer that is never returned
/// stays live across the boot-services exit, which is exactly what the
/// surrendered memory map needs.
pub struct UefiPool {
    ptr: NonNull<u8>,
    len: usize,
}

impl UefiPool {
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

impl AsRef<[u8]> for UefiPool {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: ptr/len describe one live pool allocation and firmware
        // does not touch it between allocate and free.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl AsMut<[u8]> for UefiPool {
    fn as_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, with exclusive access through &mut self.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

/// [`ServiceTable`] over the firmware's boot services.
///
/// Holds the boot services pointer directly. A successful
/// `exit_boot_services` clears it, after which every operation reports
/// `UNSUPPORTED` and [`is_available`](ServiceTable::is_available) is
/// false.
pub struct UefiServiceTable {
    boot: *mut BootServices,
}

impl UefiServiceTable {
    /// Binds to the boot services referenced by `system_table`.
    ///
    /// A null system table, or one whose boot services pointer is
    /// already null, binds as permanently unavailable.
    ///
    /// # Safety
    ///
    /// `system_table` must be null or point to the valid firmware
    /// system table passed to the loader's entry point.
    #[must_use]
    pub unsafe fn from_system_table(system_table: *mut SystemTable) -> Self {
        if system_table.is_null() {
            return Self { boot: ptr::null_mut() };
        }
        // SAFETY: checked non-null; the caller guarantees validity.
        let boot = unsafe { (*system_table).boot_services };
        Self { boot }
    }

    const fn services(&self) -> Option<*mut BootServices> {
        if self.boot.is_null() {
            None
        } else {
            Some(self.boot)
        }
    }
}

impl ServiceTable for UefiServiceTable {
    type Pool = UefiPool;

    fn is_available(&self) -> bool {
        !self.boot.is_null()
    }

    fn memory_map(&mut self, buffer: Option<&mut UefiPool>, meta: &mut MemoryMapMeta) -> Status {
        let Some(boot) = self.services() else {
            return Status::UNSUPPORTED;
        };

        let (map_ptr, mut map_size) = match buffer {
            Some(pool) => (pool.as_mut().as_mut_ptr().cast::<MemoryDescriptor>(), pool.len()),
            None => (ptr::null_mut(), 0),
        };
        let mut map_key = 0usize;
        let mut desc_size = 0usize;
        let mut desc_version = 0u32;

        // SAFETY: boot points to live boot services and every out
        // parameter points to a stack local.
        let raw = unsafe {
            ((*boot).get_memory_map)(
                &raw mut map_size,
                map_ptr,
                &raw mut map_key,
                &raw mut desc_size,
                &raw mut desc_version,
            )
        };

        let status = Status::from_raw(raw.0);
        if status == Status::SUCCESS || status == Status::BUFFER_TOO_SMALL {
            meta.map_size = map_size;
            meta.desc_size = desc_size;
            meta.desc_version = desc_version;
        }
        if status == Status::SUCCESS {
            meta.map_key = MapKey::new(map_key as u64);
        }
        status
    }

    fn allocate_pool(&mut self, class: MemoryClass, size: usize) -> Result<UefiPool, Status> {
        let Some(boot) = self.services() else {
            return Err(Status::UNSUPPORTED);
        };

        let mut raw_ptr: *mut u8 = ptr::null_mut();
        // SAFETY: boot points to live boot services and raw_ptr is a
        // stack local for the out parameter.
        let raw = unsafe {
            ((*boot).allocate_pool)(MemoryType(class.as_u32()), size, &raw mut raw_ptr)
        };

        let status = Status::from_raw(raw.0);
        if status.is_error() {
            return Err(status);
        }
        // Success with a null buffer is firmware misbehavior
        let Some(ptr) = NonNull::new(raw_ptr) else {
            return Err(Status::DEVICE_ERROR);
        };
        Ok(UefiPool { ptr, len: size })
    }

    fn free_pool(&mut self, pool: UefiPool) {
        let Some(boot) = self.services() else {
            return;
        };
        // SAFETY: the pointer came out of allocate_pool on this table
        // and the pool is consumed here, so this is the only free.
        let _ = unsafe { ((*boot).free_pool)(pool.ptr.as_ptr()) };
    }

    fn exit_boot_services(&mut self, image: ImageHandle, key: MapKey) -> Status {
        let Some(boot) = self.services() else {
            return Status::UNSUPPORTED;
        };

        // SAFETY: boot points to live boot services; the handle and key
        // are forwarded verbatim and firmware validates both.
        let raw = unsafe {
            ((*boot).exit_boot_services)(
                image.as_u64() as uefi_raw::Handle,
                key.as_u64() as usize,
            )
        };

        let status = Status::from_raw(raw.0);
        if status.is_success() {
            // Boot services are gone, no call is valid past this point
            self.boot = ptr::null_mut();
        }
        status
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use core::mem;

    use super::*;

    #[test]
    fn null_system_table_binds_as_unavailable() {
        let mut table = unsafe { UefiServiceTable::from_system_table(ptr::null_mut()) };

        assert!(!table.is_available());
        let mut meta = MemoryMapMeta::default();
        assert_eq!(table.memory_map(None, &mut meta), Status::UNSUPPORTED);
        assert_eq!(
            table.allocate_pool(MemoryClass::LOADER_DATA, 64).err(),
            Some(Status::UNSUPPORTED)
        );
        assert_eq!(
            table.exit_boot_services(ImageHandle::new(1), MapKey::new(1)),
            Status::UNSUPPORTED
        );
    }

    #[test]
    fn exited_system_table_binds_as_unavailable() {
        // Firmware nulls the boot services pointer once they are gone
        let mut system_table: SystemTable = unsafe { mem::zeroed() };

        let table = unsafe { UefiServiceTable::from_system_table(&raw mut system_table) };

        assert!(!table.is_available());
    }
}
