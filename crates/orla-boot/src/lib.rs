// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! # Orla Boot
//!
//! Memory map acquisition and boot-services handoff for the Orla loader.
//!
//! This crate owns the loader's last conversation with firmware. It:
//! - Measures and fetches the firmware memory map with growth slack
//! - Validates alignment and record integrity before anything uses it
//! - Exits boot services with a fresh map key, retrying lost races
//! - Surrenders the final map to the runtime once firmware is gone
//!
//! Everything runs against the [`table::ServiceTable`] trait, so the
//! whole protocol is testable on a host against scripted firmware and
//! binds to real boot services behind the `uefi` feature.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(test)]
mod lib_test;

pub mod acquire;
pub mod error;
pub mod handoff;
pub mod snapshot;
pub mod table;

pub use acquire::{AcquireConfig, AcquireError, MapAcquirer};
pub use error::ErrorKind;
pub use handoff::{HandoffCoordinator, HandoffError};
pub use snapshot::{MemoryMapSnapshot, OwnedMemoryMap};
pub use table::ServiceTable;

pub use orla_efi::{ImageHandle, MapKey, MemoryClass, MemoryMapMeta, Status};

/// Crate version.
pub const VERSION: &str = match option_env!("ORLA_VERSION") {
    Some(v) => v,
    None => "unknown",
};
