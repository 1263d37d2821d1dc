//! litscan-common — Shared error type and the sandboxed HTTP client used across litscan crates.

pub mod error;
pub mod sandbox;

pub use error::{LitscanError, Result};
