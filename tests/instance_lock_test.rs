// ABOUTME: Tests for instance lock acquire/release semantics
// ABOUTME: Validates exclusivity against a live marker and release on drop
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use fitsync::lock::{InstanceLock, LockError};
use std::fs;

#[test]
fn acquire_creates_pid_tagged_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitsync.pid");

    let lock = InstanceLock::acquire(&path).unwrap();
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, std::process::id().to_string());

    lock.release().unwrap();
    assert!(!path.exists());
}

#[test]
fn second_acquire_fails_without_touching_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitsync.pid");

    let _held = InstanceLock::acquire(&path).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let second = InstanceLock::acquire(&path);
    assert!(matches!(second, Err(LockError::AlreadyRunning(_))));
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn acquire_succeeds_again_after_release() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitsync.pid");

    InstanceLock::acquire(&path).unwrap().release().unwrap();
    let again = InstanceLock::acquire(&path);
    assert!(again.is_ok());
}

#[test]
fn dropping_the_handle_releases_the_marker() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitsync.pid");

    {
        let _lock = InstanceLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
    assert!(!path.exists());
}

#[test]
fn stale_marker_from_a_dead_process_still_blocks() {
    // The marker's presence is the invariant; operators clear stale ones by
    // hand, exactly as the error message instructs.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fitsync.pid");
    fs::write(&path, "12345").unwrap();

    let result = InstanceLock::acquire(&path);
    assert!(matches!(result, Err(LockError::AlreadyRunning(_))));
}
