//! Floodgate - Permit-Based Admission Control
//!
//! This crate implements a permit-based rate limiter: each limiter owns a
//! bounded pool of permits that refills on a fixed period, and callers are
//! admitted immediately, told how long to wait, or rejected. The admission
//! decision is synchronous and non-blocking; the wait itself is performed by
//! the caller (or by the provided async conveniences), so the limiter
//! composes with any concurrency model.

pub mod config;
pub mod error;
pub mod ratelimit;
