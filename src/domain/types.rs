//! Shared types for the lot: vehicles, spot classes and spots

/// Newtype wrapper for spot IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SpotId(pub u32);

impl std::fmt::Display for SpotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "S{:03}", self.0)
    }
}

/// Space demand of a vehicle, ordered smallest first.
///
/// Discriminants line up with `SpotType`: a size fits every spot class
/// whose discriminant is at least its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VehicleSize {
    Small = 0,
    Medium = 1,
    Large = 2,
}

impl VehicleSize {
    pub const ALL: [VehicleSize; 3] = [VehicleSize::Small, VehicleSize::Medium, VehicleSize::Large];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleSize::Small => "small",
            VehicleSize::Medium => "medium",
            VehicleSize::Large => "large",
        }
    }
}

impl std::fmt::Display for VehicleSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity class of a spot: the largest vehicle it can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SpotType {
    Compact = 0,
    Regular = 1,
    Oversized = 2,
}

impl SpotType {
    /// Tiers in allocation order
    pub const ALL: [SpotType; 3] = [SpotType::Compact, SpotType::Regular, SpotType::Oversized];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotType::Compact => "compact",
            SpotType::Regular => "regular",
            SpotType::Oversized => "oversized",
        }
    }

    /// Whether a vehicle of `size` fits a spot of this class.
    ///
    /// Pure size check; occupancy is the pool's concern.
    #[inline]
    pub fn fits(self, size: VehicleSize) -> bool {
        self as u8 >= size as u8
    }
}

impl std::fmt::Display for SpotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vehicle requesting a spot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub plate: String,
    pub size: VehicleSize,
}

impl Vehicle {
    pub fn new(plate: impl Into<String>, size: VehicleSize) -> Self {
        Self { plate: plate.into(), size }
    }
}

/// One allocatable spot
///
/// Occupancy is derived from `occupant`, so a spot can never be marked
/// occupied without a vehicle or hold a vehicle while marked free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spot {
    pub id: SpotId,
    pub kind: SpotType,
    pub(crate) occupant: Option<Vehicle>,
}

impl Spot {
    #[inline]
    pub fn new(id: SpotId, kind: SpotType) -> Self {
        Self { id, kind, occupant: None }
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    #[inline]
    pub fn occupant(&self) -> Option<&Vehicle> {
        self.occupant.as_ref()
    }

    pub(crate) fn occupy(&mut self, vehicle: &Vehicle) {
        self.occupant = Some(vehicle.clone());
    }

    /// Clear the occupant, returning who was parked
    pub(crate) fn vacate(&mut self) -> Option<Vehicle> {
        self.occupant.take()
    }
}
