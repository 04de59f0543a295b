// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Firmware status codes.
//!
//! UEFI encodes a status as one machine word: zero is success, and error
//! codes carry the most significant bit plus a small code number. Warning
//! codes (high bit clear, nonzero) exist in the standard but none are
//! produced by the services Orla consumes, so they are not named here.

use core::fmt;

/// The high bit marking a status word as an error.
const ERROR_BIT: usize = 1 << (usize::BITS - 1);

/// A firmware status code.
///
/// Values cross the firmware boundary unchanged; [`Status::from_raw`] and
/// [`Status::as_raw`] are bit-for-bit conversions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Status(usize);

impl Status {
    /// The operation completed successfully.
    pub const SUCCESS: Self = Self(0);

    /// The buffer is too small to hold the requested data. The required
    /// size is reported through the call's size parameter.
    pub const BUFFER_TOO_SMALL: Self = Self::error(5);

    /// A parameter was outside its valid range. Also what the transition
    /// call returns for a stale map key.
    pub const INVALID_PARAMETER: Self = Self::error(2);

    /// The operation is not supported on this platform.
    pub const UNSUPPORTED: Self = Self::error(3);

    /// The service is not ready, or no longer exists.
    pub const NOT_READY: Self = Self::error(6);

    /// The physical device reported an error, or an invariant the firmware
    /// guarantees was observed broken.
    pub const DEVICE_ERROR: Self = Self::error(7);

    /// A required resource pool is exhausted.
    pub const OUT_OF_RESOURCES: Self = Self::error(9);

    /// The requested item was not found.
    pub const NOT_FOUND: Self = Self::error(14);

    /// The operation was aborted.
    pub const ABORTED: Self = Self::error(21);

    /// Builds an error status from its code number.
    const fn error(code: usize) -> Self {
        Self(ERROR_BIT | code)
    }

    /// Creates a status from the raw firmware word.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw firmware word.
    #[inline]
    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Checks for exact success (not merely non-error).
    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Checks whether the error bit is set.
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        (self.0 & ERROR_BIT) != 0
    }

    /// Returns the symbolic name for a known code.
    const fn name(self) -> Option<&'static str> {
        match self {
            Self::SUCCESS => Some("SUCCESS"),
            Self::BUFFER_TOO_SMALL => Some("BUFFER_TOO_SMALL"),
            Self::INVALID_PARAMETER => Some("INVALID_PARAMETER"),
            Self::UNSUPPORTED => Some("UNSUPPORTED"),
            Self::NOT_READY => Some("NOT_READY"),
            Self::DEVICE_ERROR => Some("DEVICE_ERROR"),
            Self::OUT_OF_RESOURCES => Some("OUT_OF_RESOURCES"),
            Self::NOT_FOUND => Some("NOT_FOUND"),
            Self::ABORTED => Some("ABORTED"),
            Self(_) => None,
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Status({name})"),
            None => write!(f, "Status({:#x})", self.0),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}
