//! BodyMetrics - body measurement tracking API
//!
//! An HTTP backend for accounts, the people they track and dated body
//! metrics. Login and password reset requests are guarded by a per-client
//! sliding window rate limiter.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod mail;
pub mod model;
pub mod ratelimit;
pub mod store;
