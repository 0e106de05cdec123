//! lockbox lifecycle service library.
//!
//! This crate primarily ships a `lifecycle` binary, but we expose the full
//! module surface as a library so integration tests (and embedding callers)
//! can wire the rotation service, scanner, and consumer against their own
//! store implementations.

pub mod audit;
pub mod bus;
pub mod cleanup;
pub mod config;
pub mod consumer;
pub mod crypto;
pub mod db;
pub mod metrics;
pub mod rotation;
pub mod scanner;
pub mod stores;
