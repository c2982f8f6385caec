// ABOUTME: Tests for environment-based configuration loading
// ABOUTME: Serialized because they mutate process-wide environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use fitsync::config::Config;
use serial_test::serial;
use std::env;
use std::path::Path;

const REQUIRED: &[(&str, &str)] = &[
    ("STRAVA_CLIENT_ID", "12345"),
    ("STRAVA_CLIENT_SECRET", "shhh"),
    ("STRAVA_TOKEN_FILE", "/tmp/strava_tokens.json"),
    ("FITTRACKEE_CLIENT_ID", "abcde"),
    ("FITTRACKEE_CLIENT_SECRET", "hush"),
    ("FITTRACKEE_TOKEN_FILE", "/tmp/fittrackee_tokens.json"),
    ("FITTRACKEE_HOST", "fittrackee.example.org"),
];

fn set_all() {
    for (key, value) in REQUIRED {
        env::set_var(key, value);
    }
}

fn clear_all() {
    for (key, _) in REQUIRED {
        env::remove_var(key);
    }
    env::remove_var("FITSYNC_LOCK_FILE");
}

#[test]
#[serial]
fn full_environment_resolves() {
    set_all();
    let config = Config::from_env().unwrap();
    assert_eq!(config.strava.client_id, "12345");
    assert_eq!(config.fittrackee_host, "fittrackee.example.org");
    assert_eq!(config.lock_file, Path::new("fitsync.pid"));
    clear_all();
}

#[test]
#[serial]
fn missing_credential_is_fatal() {
    set_all();
    env::remove_var("STRAVA_CLIENT_SECRET");
    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("STRAVA_CLIENT_SECRET"));
    clear_all();
}

#[test]
#[serial]
fn lock_file_override_is_honored() {
    set_all();
    env::set_var("FITSYNC_LOCK_FILE", "/tmp/fitsync-test.pid");
    let config = Config::from_env().unwrap();
    assert_eq!(config.lock_file, Path::new("/tmp/fitsync-test.pid"));
    clear_all();
}
