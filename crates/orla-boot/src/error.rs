// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Retry taxonomy shared by acquisition and handoff errors.

use core::fmt;

/// What went wrong, classified by whether retrying can help.
///
/// Every concrete error maps to exactly one kind via its `kind()` method,
/// so callers can branch on retry semantics without enumerating variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller violated the API contract. Never retried.
    InvalidInput,

    /// A required service is absent or already gone. Never retried.
    ServiceUnavailable,

    /// Measured state went stale before it was consumed. Retried as a
    /// full acquire cycle within a bounded budget; this kind surfaces
    /// only once the budget is spent.
    TransientRace,

    /// An allocation failed and no fallback allocator exists. Never
    /// retried.
    ResourceExhaustion,

    /// A firmware-guaranteed invariant was observed broken. Never
    /// retried, even with budget remaining, because retrying cannot
    /// repair a broken invariant.
    DataCorruption,
}

impl ErrorKind {
    /// Whether the protocol retries this class internally.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::TransientRace)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid input"),
            Self::ServiceUnavailable => write!(f, "service unavailable"),
            Self::TransientRace => write!(f, "transient race"),
            Self::ResourceExhaustion => write!(f, "resource exhaustion"),
            Self::DataCorruption => write!(f, "data corruption"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_race_kind_is_retryable() {
        assert!(ErrorKind::TransientRace.is_retryable());
        assert!(!ErrorKind::InvalidInput.is_retryable());
        assert!(!ErrorKind::ServiceUnavailable.is_retryable());
        assert!(!ErrorKind::ResourceExhaustion.is_retryable());
        assert!(!ErrorKind::DataCorruption.is_retryable());
    }

    #[test]
    fn kind_display() {
        assert_eq!(format!("{}", ErrorKind::TransientRace), "transient race");
        assert_eq!(format!("{}", ErrorKind::DataCorruption), "data corruption");
    }
}
