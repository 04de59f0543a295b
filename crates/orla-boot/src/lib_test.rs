// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Tests for the library root.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;

#[test]
fn version_is_not_empty() {
    assert!(!VERSION.is_empty());
}
