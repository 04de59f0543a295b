// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Exit protocol tests.
//!
//! The coordinator's contract under fire: a fresh snapshot on every
//! attempt, a surrendered buffer on exactly one success, and balanced
//! allocation accounting on every abort path.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::table::{MockServiceTable, record_tag};

const IMAGE: ImageHandle = ImageHandle::new(0x1000);

#[test]
fn clean_firmware_commits_on_the_first_attempt() {
    let mut table = MockServiceTable::new(4, 48);
    let coordinator = HandoffCoordinator::new();

    let map = coordinator.execute(&mut table, IMAGE).expect("clean handoff");

    assert!(table.has_exited());
    assert_eq!(table.exit_calls(), 1);
    assert_eq!(table.probe_calls(), 1);
    assert_eq!(table.allocate_calls(), 1);
    assert_eq!(table.free_calls(), 0);
    assert_eq!(table.live_allocations(), 1);
    assert_eq!(map.descriptor_count(), 4);
    assert_eq!(map.bytes().len(), 192);
    for (index, record) in map.descriptors().enumerate() {
        assert_eq!(record_tag(record), index as u64);
    }
}

#[test]
fn drifting_key_is_retried_with_a_fresh_snapshot_each_time() {
    let mut table = MockServiceTable::new(4, 48);
    table.drift_before_exit(2);
    let coordinator = HandoffCoordinator::new();

    let map = coordinator.execute(&mut table, IMAGE).expect("third attempt commits");

    assert!(table.has_exited());
    assert_eq!(table.exit_calls(), 3);
    assert_eq!(table.probe_calls(), 3);
    assert_eq!(table.allocate_calls(), 3);
    assert_eq!(table.free_calls(), 2);
    assert_eq!(table.live_allocations(), 1);
    assert_eq!(map.descriptor_count(), 4);
}

#[test]
fn permanent_drift_aborts_after_the_attempt_budget() {
    let mut table = MockServiceTable::new(4, 48);
    table.drift_before_exit(u32::MAX);
    let coordinator = HandoffCoordinator::new();

    let error = coordinator.execute(&mut table, IMAGE).expect_err("drift never stops");

    assert_eq!(error, HandoffError::Aborted);
    assert!(!table.has_exited());
    assert_eq!(table.exit_calls(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(table.probe_calls(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(table.allocate_calls(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(table.free_calls(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(table.live_allocations(), 0);
}

#[test]
fn null_image_is_refused_before_any_firmware_call() {
    let mut table = MockServiceTable::new(4, 48);
    let coordinator = HandoffCoordinator::new();

    let error = coordinator
        .execute(&mut table, ImageHandle::null())
        .expect_err("null handle");

    assert_eq!(error, HandoffError::InvalidImage);
    assert_eq!(table.probe_calls(), 0);
    assert_eq!(table.allocate_calls(), 0);
    assert_eq!(table.exit_calls(), 0);
}

#[test]
fn unavailable_services_are_refused_before_any_firmware_call() {
    let mut table = MockServiceTable::new(4, 48);
    table.mark_unavailable();
    let coordinator = HandoffCoordinator::new();

    let error = coordinator.execute(&mut table, IMAGE).expect_err("gone is gone");

    assert_eq!(error, HandoffError::NotReady);
    assert_eq!(table.probe_calls(), 0);
    assert_eq!(table.allocate_calls(), 0);
    assert_eq!(table.exit_calls(), 0);
}

#[test]
fn acquisition_failure_aborts_without_touching_the_transition() {
    let mut table = MockServiceTable::new(4, 48);
    table.deny_allocations();
    let coordinator = HandoffCoordinator::new();

    let error = coordinator.execute(&mut table, IMAGE).expect_err("no buffer, no exit");

    assert_eq!(
        error,
        HandoffError::Acquire(AcquireError::AllocationFailed(Status::OUT_OF_RESOURCES))
    );
    assert_eq!(table.exit_calls(), 0);
    assert!(!table.has_exited());
}

#[test]
fn attempt_budget_override_is_honored() {
    let mut table = MockServiceTable::new(4, 48);
    table.drift_before_exit(u32::MAX);
    let coordinator = HandoffCoordinator::with_config(AcquireConfig::DEFAULT, 2);

    let error = coordinator.execute(&mut table, IMAGE).expect_err("short budget");

    assert_eq!(error, HandoffError::Aborted);
    assert_eq!(table.exit_calls(), 2);
    assert_eq!(coordinator.max_attempts(), 2);
    assert_eq!(coordinator.config(), AcquireConfig::DEFAULT);
}

#[test]
fn stock_policy_matches_the_defaults() {
    let coordinator = HandoffCoordinator::default();
    assert_eq!(coordinator.max_attempts(), DEFAULT_MAX_ATTEMPTS);
    assert_eq!(coordinator.config(), AcquireConfig::DEFAULT);
}

#[test]
fn error_kinds_follow_the_taxonomy() {
    assert_eq!(HandoffError::InvalidImage.kind(), ErrorKind::InvalidInput);
    assert_eq!(HandoffError::NotReady.kind(), ErrorKind::ServiceUnavailable);
    assert_eq!(
        HandoffError::Acquire(AcquireError::RetriesExhausted).kind(),
        ErrorKind::TransientRace
    );
    assert_eq!(HandoffError::Aborted.kind(), ErrorKind::TransientRace);
}

#[test]
fn error_statuses_reproduce_the_exit_surface() {
    assert_eq!(HandoffError::InvalidImage.status(), Status::INVALID_PARAMETER);
    assert_eq!(HandoffError::NotReady.status(), Status::NOT_READY);
    assert_eq!(HandoffError::Aborted.status(), Status::ABORTED);
    assert_eq!(
        HandoffError::Acquire(AcquireError::Unavailable).status(),
        Status::NOT_READY
    );
}

#[test]
fn acquire_errors_convert_losslessly() {
    let error: HandoffError = AcquireError::ZeroStride.into();
    assert_eq!(error, HandoffError::Acquire(AcquireError::ZeroStride));
    assert_eq!(
        format!("{error}"),
        "memory map acquisition failed: firmware reported a zero descriptor stride"
    );
}
