// ABOUTME: Strava-to-FitTrackee synchronization library
// ABOUTME: OAuth2 sessions, quota-aware throttling, incremental sync engine, instance locking
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental synchronization of Strava activities into a FitTrackee
//! instance.
//!
//! The crate is organized around a small set of collaborators:
//!
//! - [`oauth::OAuthSession`] owns the token lifecycle and request issuing
//!   for one provider, throttled by a [`rate_limit::RateLimiter`].
//! - [`providers::strava::StravaClient`] lists activities and assembles
//!   track payloads from the Strava streams API.
//! - [`providers::fittrackee::FitTrackeeClient`] queries existing workouts
//!   and uploads GPX tracks.
//! - [`sync`] walks new source activities oldest-first and transfers them,
//!   deriving idempotency from the destination's latest workout time.
//! - [`lock::InstanceLock`] keeps concurrent runs from double-uploading.

/// Environment-based configuration for both providers
pub mod config;
/// Structured error types shared across providers
pub mod errors;
/// Shared HTTP client with connection pooling
pub mod http;
/// Single-instance lock marker management
pub mod lock;
/// Domain models exchanged between source and destination
pub mod models;
/// OAuth2 sessions: interactive exchange, refresh, authorized requests
pub mod oauth;
/// Source and destination API clients
pub mod providers;
/// Sliding-window request budgeting
pub mod rate_limit;
/// Incremental synchronization engine
pub mod sync;
/// On-disk OAuth2 token persistence
pub mod token_store;
/// GPX rendering and parsing for track payloads
pub mod track;

pub use errors::{ProviderError, ProviderResult};
pub use models::{Activity, TrackPayload, TrackPoint, Workout};
pub use sync::RunSummary;
