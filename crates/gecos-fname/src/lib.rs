//! gecos-fname library.
//!
//! Builds a mail display name from a GECOS full-name field, in two flavours:
//! the historical routine that trusts the caller's buffer size, and a
//! hardened one that takes the capacity explicitly.
//!
//! This is the public interface used by:
//! - The gecos-fname harness binary (main.rs)
//! - Fuzz tests
//! - Unit and integration tests

pub mod alloc;
pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod gecos;
pub mod harness;
pub mod trace;

pub use error::{FnameError, FnameResult};
