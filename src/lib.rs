//! Rollcall backend library.
//!
//! QR attendance service: faculty open short-lived sessions that mint a
//! single-use token per (session, student); enrolled students redeem the token
//! before expiry to record attendance.

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod middleware;
pub mod models;
pub mod qr;
pub mod store;
