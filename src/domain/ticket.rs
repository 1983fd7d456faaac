//! Tickets and checkout receipts

use crate::domain::types::{SpotId, SpotType, Vehicle, VehicleSize};
use chrono::{DateTime, Duration, FixedOffset};
use uuid::Uuid;

/// Ticket identity: normalized plate plus a UUIDv7 (time-sortable)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(String);

impl TicketId {
    /// Mint a fresh ID for a vehicle.
    ///
    /// The UUIDv7 carries a millisecond timestamp and 74 random bits, so IDs
    /// minted in the same millisecond for the same plate still differ.
    pub fn generate(plate: &str) -> Self {
        Self(format!("{}-{}", normalize_plate(plate), Uuid::now_v7()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TicketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_plate(plate: &str) -> String {
    let cleaned: String = plate
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.is_empty() {
        "ANON".to_string()
    } else {
        cleaned
    }
}

/// Receipt binding one vehicle to one spot from `issued_at` until checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: TicketId,
    pub plate: String,
    pub size: VehicleSize,
    pub spot: SpotId,
    pub spot_kind: SpotType,
    pub issued_at: DateTime<FixedOffset>,
}

impl Ticket {
    pub fn issue(vehicle: &Vehicle, spot: SpotId, spot_kind: SpotType, now: DateTime<FixedOffset>) -> Self {
        Self {
            id: TicketId::generate(&vehicle.plate),
            plate: vehicle.plate.clone(),
            size: vehicle.size,
            spot,
            spot_kind,
            issued_at: now,
        }
    }

    /// Time parked as of `now`
    #[inline]
    pub fn elapsed(&self, now: DateTime<FixedOffset>) -> Duration {
        now.signed_duration_since(self.issued_at)
    }
}

/// Settled ticket with the fee charged for it
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub ticket: Ticket,
    pub checked_out_at: DateTime<FixedOffset>,
    pub duration: Duration,
    pub billed_hours: u64,
    pub fee: f64,
}
