//! lotkeeper library
//!
//! Spot allocation, ticketing and fare computation for a parking lot.
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod services;
