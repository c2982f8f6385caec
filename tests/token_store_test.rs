// ABOUTME: Tests for on-disk token persistence
// ABOUTME: Round trip, absent file handling, and corrupt file rejection
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use chrono::{TimeZone, Utc};
use fitsync::oauth::OAuth2Token;
use fitsync::token_store::TokenStore;
use std::fs;

fn token() -> OAuth2Token {
    OAuth2Token {
        access_token: "access-123".into(),
        token_type: "Bearer".into(),
        expires_at: Utc.with_ymd_and_hms(2023, 3, 21, 6, 11, 44).single().unwrap(),
        refresh_token: Some("refresh-456".into()),
    }
}

#[test]
fn saved_token_loads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new("strava", dir.path().join("strava.json"));

    store.save(&token()).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded.access_token, "access-123");
    assert_eq!(loaded.refresh_token.as_deref(), Some("refresh-456"));
    assert_eq!(loaded.expires_at, token().expires_at);
}

#[test]
fn absent_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new("strava", dir.path().join("missing.json"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn corrupt_file_is_an_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strava.json");
    fs::write(&path, "{ not json").unwrap();

    let store = TokenStore::new("strava", path);
    assert!(store.load().is_err());
}

#[test]
fn save_overwrites_previous_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = TokenStore::new("strava", dir.path().join("strava.json"));

    store.save(&token()).unwrap();
    let refreshed = OAuth2Token {
        access_token: "access-789".into(),
        ..token()
    };
    store.save(&refreshed).unwrap();

    assert_eq!(store.load().unwrap().unwrap().access_token, "access-789");
}

#[test]
fn token_file_is_structured_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strava.json");
    let store = TokenStore::new("strava", path.clone());
    store.save(&token()).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("access_token"));
    assert!(raw.contains("refresh_token"));
    assert!(raw.contains("expires_at"));
}
