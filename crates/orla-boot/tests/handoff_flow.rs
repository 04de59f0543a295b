// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! End-to-end handoff flows.
//!
//! Walks the public API the way the loader does: inspect the memory map
//! while boot services are still alive, then exit boot services and hand
//! the final map to the runtime.

// Test code prioritizes clarity over defensive programming
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, missing_docs)]

use orla_boot::table::{MockServiceTable, record_tag};
use orla_boot::{
    AcquireConfig, AcquireError, ErrorKind, HandoffCoordinator, HandoffError, ImageHandle,
    MapAcquirer, ServiceTable, Status,
};

const IMAGE: ImageHandle = ImageHandle::new(0xB007_1000);

// ============================================================================
// Map Inspection Before Handoff
// ============================================================================

#[test]
fn map_can_be_inspected_and_released_while_firmware_lives() {
    let mut table = MockServiceTable::new(6, 48);
    let acquirer = MapAcquirer::new();

    {
        let snapshot = acquirer.acquire(&mut table).expect("inspection fetch");
        assert_eq!(snapshot.descriptor_count(), 6);
        for (index, record) in snapshot.descriptors().enumerate() {
            assert_eq!(record_tag(record), index as u64);
        }
    }

    // The snapshot is gone, firmware still runs and got its buffer back
    assert!(!table.has_exited());
    assert_eq!(table.live_allocations(), 0);
    assert!(table.is_available());
}

#[test]
fn inspection_then_handoff_uses_independent_snapshots() {
    let mut table = MockServiceTable::new(6, 48);
    let acquirer = MapAcquirer::new();
    let coordinator = HandoffCoordinator::new();

    {
        let snapshot = acquirer.acquire(&mut table).expect("inspection fetch");
        assert_eq!(snapshot.descriptor_count(), 6);
    }
    let map = coordinator.execute(&mut table, IMAGE).expect("handoff");

    // One buffer from the inspection (freed), one surrendered to the map
    assert_eq!(table.allocate_calls(), 2);
    assert_eq!(table.free_calls(), 1);
    assert_eq!(table.live_allocations(), 1);
    assert_eq!(map.descriptor_count(), 6);
}

// ============================================================================
// The Straight-Line Handoff
// ============================================================================

#[test]
fn four_descriptors_at_48_bytes_commit_on_the_first_attempt() {
    let mut table = MockServiceTable::new(4, 48);
    let coordinator = HandoffCoordinator::new();

    let map = coordinator.execute(&mut table, IMAGE).expect("clean handoff");

    // 192 probed bytes plus 16 slack strides of 48 bytes
    assert_eq!(table.last_allocation_size(), 960);
    assert_eq!(table.exit_calls(), 1);
    assert!(table.has_exited());
    assert_eq!(map.descriptor_count(), 4);
    assert_eq!(map.descriptor_size(), 48);
    assert_eq!(map.bytes().len(), 192);

    let (pool, meta) = map.into_parts();
    assert_eq!(meta.descriptor_count(), 4);
    assert!(pool.len() >= meta.map_size);
}

// ============================================================================
// Contested Handoff
// ============================================================================

#[test]
fn contested_handoff_reacquires_until_the_key_holds() {
    let mut table = MockServiceTable::new(4, 48);
    table.drift_before_exit(3);
    let coordinator = HandoffCoordinator::new();

    let map = coordinator.execute(&mut table, IMAGE).expect("fourth attempt commits");

    assert_eq!(table.exit_calls(), 4);
    assert_eq!(table.probe_calls(), 4);
    assert_eq!(table.allocate_calls(), 4);
    assert_eq!(table.free_calls(), 3);
    assert_eq!(table.live_allocations(), 1);
    for (index, record) in map.descriptors().enumerate() {
        assert_eq!(record_tag(record), index as u64);
    }
}

#[test]
fn growth_during_the_handoff_is_absorbed_too() {
    let mut table = MockServiceTable::new(4, 48);
    table.grow_once(17);
    let coordinator = HandoffCoordinator::new();

    let map = coordinator.execute(&mut table, IMAGE).expect("grown map commits");

    // Growth past slack costs one extra acquisition cycle, not an attempt
    assert_eq!(table.exit_calls(), 1);
    assert_eq!(table.probe_calls(), 2);
    assert_eq!(map.descriptor_count(), 21);
}

// ============================================================================
// Failure Surfaces
// ============================================================================

#[test]
fn exhausted_drift_reports_a_retryable_abort() {
    let mut table = MockServiceTable::new(4, 48);
    table.drift_before_exit(u32::MAX);
    let coordinator = HandoffCoordinator::with_config(AcquireConfig::DEFAULT, 3);

    let error = coordinator.execute(&mut table, IMAGE).expect_err("drift outlasts budget");

    assert_eq!(error, HandoffError::Aborted);
    assert_eq!(error.kind(), ErrorKind::TransientRace);
    assert!(error.kind().is_retryable());
    assert_eq!(error.status(), Status::ABORTED);
    assert_eq!(table.exit_calls(), 3);
    assert_eq!(table.live_allocations(), 0);
    assert!(table.is_available());
}

#[test]
fn broken_firmware_surfaces_as_a_fatal_device_error() {
    let mut table = MockServiceTable::new(4, 48);
    table.pad_fetch_size(5);
    let coordinator = HandoffCoordinator::new();

    let error = coordinator.execute(&mut table, IMAGE).expect_err("partial record");

    assert_eq!(error, HandoffError::Acquire(AcquireError::RaggedSize));
    assert_eq!(error.kind(), ErrorKind::DataCorruption);
    assert!(!error.kind().is_retryable());
    assert_eq!(error.status(), Status::DEVICE_ERROR);
    assert_eq!(table.exit_calls(), 0);
}
