// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Memory map acquisition.
//!
//! One routine serves every caller that needs the current memory map,
//! whether to inspect it or to exit boot services with its key. Each
//! cycle runs the full sequence:
//!
//! 1. Probe with a null buffer for the required size and stride.
//! 2. Inflate the size by a slack margin of extra descriptor strides,
//!    because the allocation in step 3 can itself grow the map.
//! 3. Allocate the buffer from loader-data pool memory.
//! 4. Fetch the map into the buffer.
//! 5. Validate alignment and that the reported size is a whole number
//!    of records.
//!
//! A fetch refused as still too small, or failed outright, frees the
//! buffer and restarts the whole cycle, bounded by the retry budget.
//! Probe protocol violations, allocation failure and validation failure
//! are fatal immediately: more retries cannot fix a broken allocator or
//! broken firmware, only a moving map.

use log::{debug, error, warn};

use crate::error::ErrorKind;
use crate::snapshot::MemoryMapSnapshot;
use crate::table::ServiceTable;
use orla_efi::{
    DESCRIPTOR_ALIGN, MemoryClass, MemoryMapMeta, Status, memory::is_descriptor_aligned,
};

/// Extra descriptor strides allocated beyond the probed size.
pub const DEFAULT_SLACK_DESCRIPTORS: usize = 16;

/// Probe-allocate-fetch cycles before giving up on a moving map.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Tuning knobs for [`MapAcquirer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquireConfig {
    /// Extra descriptor strides allocated beyond the probed size.
    pub slack_descriptors: usize,
    /// Upper bound on probe-allocate-fetch cycles.
    pub max_retries: u32,
}

impl AcquireConfig {
    /// The stock policy: 16 slack strides, 8 cycles.
    pub const DEFAULT: Self = Self {
        slack_descriptors: DEFAULT_SLACK_DESCRIPTORS,
        max_retries: DEFAULT_MAX_RETRIES,
    };
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Why an acquisition gave up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireError {
    /// The service table reports boot services gone; nothing was called.
    Unavailable,
    /// The size probe returned the carried status instead of refusing
    /// with the too-small signal. A probe that "succeeds" against a null
    /// buffer is malformed firmware, so success lands here too.
    ProbeProtocol(Status),
    /// The probe reported a zero descriptor stride.
    ZeroStride,
    /// Pool allocation for the map buffer failed with the carried
    /// status. There is no fallback allocator this early.
    AllocationFailed(Status),
    /// The allocated buffer does not meet the 8-byte descriptor
    /// alignment the firmware itself guarantees.
    MisalignedBuffer,
    /// The fetched size is not a whole number of descriptor records
    /// inside the fetched buffer.
    RaggedSize,
    /// The map kept moving for the whole retry budget.
    RetriesExhausted,
}

impl AcquireError {
    /// Taxonomy class, which also decides retryability.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::Unavailable => ErrorKind::ServiceUnavailable,
            Self::ProbeProtocol(_)
            | Self::ZeroStride
            | Self::MisalignedBuffer
            | Self::RaggedSize => ErrorKind::DataCorruption,
            Self::AllocationFailed(_) => ErrorKind::ResourceExhaustion,
            Self::RetriesExhausted => ErrorKind::TransientRace,
        }
    }

    /// Firmware-status rendition for bootstrap glue that exits with a
    /// raw code. Never a success status.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::Unavailable => Status::NOT_READY,
            Self::AllocationFailed(status) => status,
            Self::ProbeProtocol(_)
            | Self::ZeroStride
            | Self::MisalignedBuffer
            | Self::RaggedSize
            | Self::RetriesExhausted => Status::DEVICE_ERROR,
        }
    }
}

impl core::fmt::Display for AcquireError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "boot services are not available"),
            Self::ProbeProtocol(status) => {
                write!(f, "size probe returned {status} instead of the too-small signal")
            }
            Self::ZeroStride => write!(f, "firmware reported a zero descriptor stride"),
            Self::AllocationFailed(status) => {
                write!(f, "map buffer allocation failed: {status}")
            }
            Self::MisalignedBuffer => {
                write!(f, "map buffer is not {DESCRIPTOR_ALIGN}-byte aligned")
            }
            Self::RaggedSize => {
                write!(f, "map size is not a whole number of descriptor records")
            }
            Self::RetriesExhausted => {
                write!(f, "memory map did not stabilize within the retry budget")
            }
        }
    }
}

/// Acquires validated memory map snapshots from a service table.
#[derive(Clone, Copy, Debug)]
pub struct MapAcquirer {
    config: AcquireConfig,
}

impl MapAcquirer {
    /// Acquirer with the stock policy.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            config: AcquireConfig::DEFAULT,
        }
    }

    /// Acquirer with an overridden policy.
    #[must_use]
    pub const fn with_config(config: AcquireConfig) -> Self {
        Self { config }
    }

    /// The active policy.
    #[must_use]
    pub const fn config(&self) -> AcquireConfig {
        self.config
    }

    /// Runs probe-allocate-fetch-validate cycles until a snapshot holds
    /// or the budget runs out.
    ///
    /// The snapshot borrows `table` exclusively, which keeps its map key
    /// fresh until it is committed or dropped.
    ///
    /// # Errors
    ///
    /// [`AcquireError::RetriesExhausted`] when the map moved on every
    /// cycle; the other variants are fatal conditions reported on the
    /// cycle that hit them.
    pub fn acquire<'t, T: ServiceTable>(
        &self,
        table: &'t mut T,
    ) -> Result<MemoryMapSnapshot<'t, T>, AcquireError> {
        if !table.is_available() {
            error!("memory map requested but boot services are not available");
            return Err(AcquireError::Unavailable);
        }

        let max = self.config.max_retries;
        for attempt in 1..=max {
            let mut meta = MemoryMapMeta::default();

            let status = table.memory_map(None, &mut meta);
            if status != Status::BUFFER_TOO_SMALL {
                error!("memory map size probe returned {status} instead of the too-small signal");
                return Err(AcquireError::ProbeProtocol(status));
            }
            if meta.desc_size == 0 {
                error!("memory map probe reported a zero descriptor stride");
                return Err(AcquireError::ZeroStride);
            }
            debug!(
                "memory map probe: {} bytes, {}-byte stride, layout version {}",
                meta.map_size, meta.desc_size, meta.desc_version
            );

            let size = meta.map_size + self.config.slack_descriptors * meta.desc_size;
            let mut pool = match table.allocate_pool(MemoryClass::LOADER_DATA, size) {
                Ok(pool) => pool,
                Err(status) => {
                    error!("allocation of {size} bytes for the memory map failed: {status}");
                    return Err(AcquireError::AllocationFailed(status));
                }
            };

            let status = table.memory_map(Some(&mut pool), &mut meta);
            if status == Status::BUFFER_TOO_SMALL {
                warn!(
                    "memory map grew past slack on attempt {attempt}/{max}: need {} bytes, allocated {size}",
                    meta.map_size
                );
                table.free_pool(pool);
                continue;
            }
            if status.is_error() {
                warn!("memory map fetch failed on attempt {attempt}/{max}: {status}");
                table.free_pool(pool);
                continue;
            }

            let address = pool.as_ref().as_ptr() as usize;
            if !is_descriptor_aligned(address) {
                error!("memory map buffer at {address:#x} is not {DESCRIPTOR_ALIGN}-byte aligned");
                table.free_pool(pool);
                return Err(AcquireError::MisalignedBuffer);
            }
            if meta.map_size > pool.as_ref().len() || !meta.is_whole_records() {
                error!(
                    "memory map reports {} bytes, not a whole run of {}-byte records",
                    meta.map_size, meta.desc_size
                );
                table.free_pool(pool);
                return Err(AcquireError::RaggedSize);
            }

            debug!(
                "memory map acquired on attempt {attempt}: {} descriptors",
                meta.descriptor_count()
            );
            return Ok(MemoryMapSnapshot::new(table, pool, meta));
        }

        error!("memory map did not stabilize after {max} attempts");
        Err(AcquireError::RetriesExhausted)
    }
}

impl Default for MapAcquirer {
    fn default() -> Self {
        Self::new()
    }
}
