//! Services - allocation and ticketing
//!
//! This module contains the core business logic services:
//! - `pool` - Spot inventory with first-fit allocation and release
//! - `lot` - Check-in/check-out workflows over the pool and ticket registry

pub mod lot;
pub mod pool;

// Re-export commonly used types
pub use lot::{CheckInError, CheckoutError, ParkingLot};
pub use pool::{AllocationError, Inventory, ReleaseError, SpotPool, MAX_SPOTS};
