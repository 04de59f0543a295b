// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! UEFI ABI primitives shared across the Orla loader.
//!
//! This crate defines the vocabulary the loader uses to talk to firmware:
//! - Status codes with the standard EFI error encoding
//! - Handle and map-key newtypes
//! - Pool allocation classes
//! - Memory-map metadata (size, key, descriptor stride and version)
//!
//! # Design Principles
//!
//! - **No dependencies**: Pure data types, 100% host-testable
//! - **Bit-compatible**: Values cross the firmware boundary unchanged
//! - **64-bit only**: Orla targets 64-bit platforms exclusively
//!
//! # Modules
//!
//! - [`status`]: `Status` codes and the error-bit encoding
//! - [`handle`]: `ImageHandle` and `MapKey` newtypes
//! - [`memory`]: `MemoryClass`, `MemoryMapMeta`, descriptor alignment rules

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod handle;
pub mod memory;
pub mod status;

// Re-export commonly used types at crate root
pub use handle::{ImageHandle, MapKey};
pub use memory::{DESCRIPTOR_ALIGN, DESCRIPTOR_VERSION, MemoryClass, MemoryMapMeta};
pub use status::Status;
