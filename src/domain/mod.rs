//! Domain models - core parking types and fare rules
//!
//! This module contains the canonical data types used throughout the system:
//! - `Vehicle` / `VehicleSize` - a client and its space demand
//! - `Spot` / `SpotType` - an allocatable unit and its capacity class
//! - `Ticket` / `Checkout` - the issued receipt and its settlement
//! - `FarePolicy` / `RateTable` - fee computation

pub mod fare;
pub mod ticket;
pub mod types;

// Re-export commonly used types at module level
pub use fare::{FarePolicy, RateTable};
pub use ticket::{Checkout, Ticket, TicketId};
pub use types::{Spot, SpotId, SpotType, Vehicle, VehicleSize};
