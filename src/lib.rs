//! Library entrypoint for boost-installer.
//!
//! The primary interface is the `install-boost` binary. The pipeline lives
//! here so integration tests can drive it with stubbed seams.

pub mod config;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod output;
pub mod plan;
pub mod platform;
