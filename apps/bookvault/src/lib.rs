//! # Bookvault Library
//!
//! This library exposes the Bookvault modules for testing and integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod api;
pub mod cleanup;
pub mod cli;
pub mod config;

// Re-export bookvault_core for convenience
pub use bookvault_core;
