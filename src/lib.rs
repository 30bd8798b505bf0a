//! Per-code device licensing.
//!
//! A license code may be bound to at most `max_devices` devices. Once bound, a
//! device has to keep presenting the same identifying attributes. The decision
//! logic lives in [`authorizer`]; the rest of the crate is the SQLite storage,
//! admin API and session handling around it.

pub mod authorizer;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod session;
pub mod util;
