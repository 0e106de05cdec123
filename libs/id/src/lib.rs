//! # lockbox-id
//!
//! Typed identifiers for lockbox resources.
//!
//! All resource IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `sec_01JF8Z2WQXKJNM8GPQY6VBKC3D`
//! - `prj_01JF8Z3MXNKPQR9HSTZ7WCLD4E`
//! - `evt_01JF8Z4NYPLTRS0JTUA8XDME5F`
//!
//! The prefix gives type safety and human readability; the ULID portion is
//! time-ordered and unique. IDs round-trip through their canonical string
//! form (parse → format → parse) and serialize as strings.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
