//! NUMEROX: Numerai tournament client
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod report;
pub mod types;

pub use error::{NumeraiError, Result};
