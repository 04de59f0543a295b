// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Boot-services exit protocol.
//!
//! Exiting boot services needs a map key that still matches the
//! firmware's current memory map, but firmware-internal activity can
//! move the map between our fetch and the transition call. That window
//! cannot be closed, only retried. Each attempt therefore runs the full
//! progression from scratch:
//!
//! 1. Acquire a fresh snapshot (probe, allocate, fetch, validate).
//! 2. Commit it: exit boot services with the snapshot's key.
//! 3. On success the snapshot's buffer becomes the runtime's map.
//!    On a refused transition the buffer is freed and the next attempt
//!    starts over at step 1. A stale snapshot is never reused.
//!
//! Acquisition failures abort the protocol immediately: the acquirer
//! already spent its own retry budget, and its fatal conditions do not
//! improve with another attempt.

use log::{error, info, warn};

use crate::acquire::{AcquireConfig, AcquireError, MapAcquirer};
use crate::error::ErrorKind;
use crate::snapshot::OwnedMemoryMap;
use crate::table::ServiceTable;
use orla_efi::{ImageHandle, Status};

/// Transition attempts before giving up on a drifting map key.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Why the handoff did not happen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffError {
    /// The caller passed a null image handle.
    InvalidImage,
    /// The service table reports boot services gone; nothing was called.
    NotReady,
    /// An attempt's acquisition failed; the transition was never tried
    /// with a stale map.
    Acquire(AcquireError),
    /// Every attempt's transition was refused.
    Aborted,
}

impl HandoffError {
    /// Taxonomy class, which also decides retryability.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidImage => ErrorKind::InvalidInput,
            Self::NotReady => ErrorKind::ServiceUnavailable,
            Self::Acquire(error) => error.kind(),
            Self::Aborted => ErrorKind::TransientRace,
        }
    }

    /// Firmware-status rendition for bootstrap glue that exits with a
    /// raw code. Never a success status.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::InvalidImage => Status::INVALID_PARAMETER,
            Self::NotReady => Status::NOT_READY,
            Self::Acquire(error) => error.status(),
            Self::Aborted => Status::ABORTED,
        }
    }
}

impl From<AcquireError> for HandoffError {
    fn from(error: AcquireError) -> Self {
        Self::Acquire(error)
    }
}

impl core::fmt::Display for HandoffError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidImage => write!(f, "image handle is null"),
            Self::NotReady => write!(f, "boot services are not available"),
            Self::Acquire(error) => write!(f, "memory map acquisition failed: {error}"),
            Self::Aborted => {
                write!(f, "boot services transition did not commit within the attempt budget")
            }
        }
    }
}

/// Drives the exit protocol to completion.
#[derive(Clone, Copy, Debug)]
pub struct HandoffCoordinator {
    acquirer: MapAcquirer,
    max_attempts: u32,
}

impl HandoffCoordinator {
    /// Coordinator with the stock policy: stock acquisition, 8 attempts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            acquirer: MapAcquirer::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Coordinator with overridden acquisition policy and attempt bound.
    #[must_use]
    pub const fn with_config(config: AcquireConfig, max_attempts: u32) -> Self {
        Self {
            acquirer: MapAcquirer::with_config(config),
            max_attempts,
        }
    }

    /// The acquisition policy each attempt runs with.
    #[must_use]
    pub const fn config(&self) -> AcquireConfig {
        self.acquirer.config()
    }

    /// Upper bound on transition attempts.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Exits boot services, retrying with a fresh map on every refused
    /// transition.
    ///
    /// On success the firmware is gone and the returned map is the
    /// runtime's authoritative picture of memory.
    ///
    /// # Errors
    ///
    /// [`HandoffError::Aborted`] when the key went stale on every
    /// attempt; precondition and acquisition failures are reported
    /// before any transition is tried with them.
    pub fn execute<T: ServiceTable>(
        &self,
        table: &mut T,
        image: ImageHandle,
    ) -> Result<OwnedMemoryMap<T::Pool>, HandoffError> {
        if image.is_null() {
            error!("boot services exit requested with a null image handle");
            return Err(HandoffError::InvalidImage);
        }
        if !table.is_available() {
            error!("boot services exit requested but boot services are not available");
            return Err(HandoffError::NotReady);
        }

        let max = self.max_attempts;
        for attempt in 1..=max {
            let snapshot = self.acquirer.acquire(&mut *table)?;
            let descriptors = snapshot.descriptor_count();
            match snapshot.commit(image) {
                Ok(map) => {
                    info!("boot services exited; {descriptors} descriptors handed to the runtime");
                    return Ok(map);
                }
                Err(status) => {
                    warn!("boot services exit refused on attempt {attempt}/{max}: {status}");
                }
            }
        }

        error!("boot services exit did not commit after {max} attempts");
        Err(HandoffError::Aborted)
    }
}

impl Default for HandoffCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod handoff_test;
