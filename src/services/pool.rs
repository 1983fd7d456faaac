//! Spot inventory and first-fit allocation
//!
//! The pool is the single source of truth for whether a spot is free. The
//! whole inventory sits behind one `RwLock`: allocate and release take the
//! write lock so the fit scan and the occupancy mark happen in one critical
//! section, while capacity queries share the read lock.
//!
//! Spots are laid out tier by tier (all Compact, then Regular, then
//! Oversized) and scanned in that order, so allocation is first-fit over a
//! smallest-tier-first layout: a Small vehicle only spills into a Regular
//! spot once every Compact spot is taken.

use crate::domain::types::{Spot, SpotId, SpotType, Vehicle, VehicleSize};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Largest pool a lot may declare
pub const MAX_SPOTS: usize = 1_000_000;

/// Number of spots per class, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub compact: usize,
    #[serde(default)]
    pub regular: usize,
    #[serde(default)]
    pub oversized: usize,
}

impl Inventory {
    pub fn new(compact: usize, regular: usize, oversized: usize) -> Self {
        Self { compact, regular, oversized }
    }

    #[inline]
    pub fn count(&self, kind: SpotType) -> usize {
        match kind {
            SpotType::Compact => self.compact,
            SpotType::Regular => self.regular,
            SpotType::Oversized => self.oversized,
        }
    }

    /// Total spot count, `None` on overflow
    #[inline]
    pub fn total(&self) -> Option<usize> {
        self.compact.checked_add(self.regular)?.checked_add(self.oversized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("no free spot fits a {size} vehicle")]
    NoCapacity { size: VehicleSize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReleaseError {
    #[error("spot {0} does not exist")]
    NotFound(SpotId),
    #[error("spot {0} is already free")]
    AlreadyFree(SpotId),
}

pub struct SpotPool {
    /// Spots in scan order
    spots: RwLock<Vec<Spot>>,
    /// SpotId -> index into `spots`, immutable after construction
    index: FxHashMap<SpotId, usize>,
}

impl SpotPool {
    /// Lay out the inventory tier by tier.
    ///
    /// Each tier is clamped so the pool never exceeds `MAX_SPOTS`;
    /// `Config::from_file` rejects such inventories before they get here.
    pub fn new(inventory: &Inventory) -> Self {
        let mut spots = Vec::with_capacity(inventory.total().unwrap_or(MAX_SPOTS).min(MAX_SPOTS));
        let mut index = FxHashMap::default();
        let mut next_id = 1u32;

        for kind in SpotType::ALL {
            let count = inventory.count(kind).min(MAX_SPOTS - spots.len());
            if count < inventory.count(kind) {
                warn!(kind = %kind, requested = inventory.count(kind), kept = count, "spot_pool_tier_clamped");
            }
            for _ in 0..count {
                let id = SpotId(next_id);
                next_id += 1;
                index.insert(id, spots.len());
                spots.push(Spot::new(id, kind));
            }
        }

        debug!(
            compact = inventory.compact,
            regular = inventory.regular,
            oversized = inventory.oversized,
            "spot_pool_created"
        );

        Self { spots: RwLock::new(spots), index }
    }

    /// Reserve the first free spot that fits the vehicle
    pub fn allocate(&self, vehicle: &Vehicle) -> Result<SpotId, AllocationError> {
        self.allocate_with_kind(vehicle).map(|(id, _)| id)
    }

    /// Same as `allocate`, also reporting the class of the reserved spot
    pub fn allocate_with_kind(&self, vehicle: &Vehicle) -> Result<(SpotId, SpotType), AllocationError> {
        let mut spots = self.spots.write();

        let Some(spot) =
            spots.iter_mut().find(|spot| !spot.is_occupied() && spot.kind.fits(vehicle.size))
        else {
            debug!(plate = %vehicle.plate, size = %vehicle.size, "spot_allocation_no_capacity");
            return Err(AllocationError::NoCapacity { size: vehicle.size });
        };

        spot.occupy(vehicle);
        debug!(
            spot = %spot.id,
            kind = %spot.kind,
            plate = %vehicle.plate,
            size = %vehicle.size,
            "spot_allocated"
        );
        Ok((spot.id, spot.kind))
    }

    /// Free a spot. Releasing a free spot is an error, not a no-op.
    pub fn release(&self, id: SpotId) -> Result<(), ReleaseError> {
        let idx = *self.index.get(&id).ok_or(ReleaseError::NotFound(id))?;
        let mut spots = self.spots.write();
        let spot = &mut spots[idx];

        match spot.vacate() {
            Some(vehicle) => {
                debug!(spot = %id, plate = %vehicle.plate, "spot_released");
                Ok(())
            }
            None => {
                warn!(spot = %id, "spot_double_release");
                Err(ReleaseError::AlreadyFree(id))
            }
        }
    }

    /// Total number of spots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.index.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.spots.read().iter().filter(|s| s.is_occupied()).count()
    }

    /// Free spots a vehicle of `size` could take right now
    pub fn available(&self, size: VehicleSize) -> usize {
        self.spots.read().iter().filter(|s| !s.is_occupied() && s.kind.fits(size)).count()
    }

    /// Free spot count per class, in tier order
    pub fn free_by_type(&self) -> [(SpotType, usize); 3] {
        let spots = self.spots.read();
        SpotType::ALL.map(|kind| {
            let free = spots.iter().filter(|s| s.kind == kind && !s.is_occupied()).count();
            (kind, free)
        })
    }

    /// Snapshot of one spot
    pub fn spot(&self, id: SpotId) -> Option<Spot> {
        let idx = *self.index.get(&id)?;
        self.spots.read().get(idx).cloned()
    }

    /// Consistent snapshot of the whole inventory in scan order
    pub fn snapshot(&self) -> Vec<Spot> {
        self.spots.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(plate: &str, size: VehicleSize) -> Vehicle {
        Vehicle::new(plate, size)
    }

    fn kinds(pool: &SpotPool) -> Vec<SpotType> {
        pool.snapshot().iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_inventory_total_overflow() {
        assert_eq!(Inventory::new(2, 2, 1).total(), Some(5));
        assert_eq!(Inventory::new(usize::MAX, 1, 0).total(), None);
        assert_eq!(Inventory::new(usize::MAX / 2, usize::MAX / 2, 2).total(), None);
    }

    #[test]
    fn test_layout_is_tiered_and_ids_sequential() {
        let pool = SpotPool::new(&Inventory::new(2, 2, 1));
        assert_eq!(
            kinds(&pool),
            vec![
                SpotType::Compact,
                SpotType::Compact,
                SpotType::Regular,
                SpotType::Regular,
                SpotType::Oversized
            ]
        );
        let ids: Vec<SpotId> = pool.snapshot().iter().map(|s| s.id).collect();
        assert_eq!(ids, (1..=5).map(SpotId).collect::<Vec<_>>());
        assert_eq!(pool.capacity(), 5);
        assert_eq!(pool.occupied_count(), 0);
    }

    #[test]
    fn test_first_fit_prefers_smaller_tier() {
        let pool = SpotPool::new(&Inventory::new(1, 1, 0));
        let id = pool.allocate(&car("A", VehicleSize::Small)).unwrap();
        assert_eq!(pool.spot(id).unwrap().kind, SpotType::Compact);
    }

    #[test]
    fn test_allocate_respects_fit() {
        let pool = SpotPool::new(&Inventory::new(3, 1, 1));

        let medium = pool.allocate(&car("M", VehicleSize::Medium)).unwrap();
        assert_eq!(pool.spot(medium).unwrap().kind, SpotType::Regular);

        let large = pool.allocate(&car("L", VehicleSize::Large)).unwrap();
        assert_eq!(pool.spot(large).unwrap().kind, SpotType::Oversized);

        // compact spots are free but too small
        let err = pool.allocate(&car("L2", VehicleSize::Large)).unwrap_err();
        assert_eq!(err, AllocationError::NoCapacity { size: VehicleSize::Large });
        assert_eq!(pool.available(VehicleSize::Small), 3);
    }

    #[test]
    fn test_allocate_never_returns_occupied_spot() {
        let pool = SpotPool::new(&Inventory::new(2, 2, 2));
        let mut seen = std::collections::HashSet::new();
        for i in 0..6 {
            let id = pool.allocate(&car(&format!("P{i}"), VehicleSize::Small)).unwrap();
            assert!(seen.insert(id), "spot {id} handed out twice");
        }
        assert!(pool.allocate(&car("P6", VehicleSize::Small)).is_err());
    }

    #[test]
    fn test_exhaustion_leaves_state_unchanged() {
        let pool = SpotPool::new(&Inventory::new(1, 0, 0));
        pool.allocate(&car("A", VehicleSize::Small)).unwrap();
        let before = pool.snapshot();

        assert!(matches!(
            pool.allocate(&car("B", VehicleSize::Small)),
            Err(AllocationError::NoCapacity { .. })
        ));
        assert_eq!(pool.snapshot(), before);
    }

    #[test]
    fn test_occupant_recorded() {
        let pool = SpotPool::new(&Inventory::new(1, 0, 0));
        let id = pool.allocate(&car("AB-1", VehicleSize::Small)).unwrap();
        let spot = pool.spot(id).unwrap();
        assert!(spot.is_occupied());
        assert_eq!(spot.occupant().unwrap().plate, "AB-1");
    }

    #[test]
    fn test_double_release_rejected() {
        let pool = SpotPool::new(&Inventory::new(1, 1, 0));
        let id = pool.allocate(&car("A", VehicleSize::Small)).unwrap();

        assert_eq!(pool.release(id), Ok(()));
        let after_first = pool.snapshot();

        assert_eq!(pool.release(id), Err(ReleaseError::AlreadyFree(id)));
        assert_eq!(pool.snapshot(), after_first);
        assert_eq!(pool.occupied_count(), 0);
    }

    #[test]
    fn test_release_unknown_spot() {
        let pool = SpotPool::new(&Inventory::new(1, 0, 0));
        assert_eq!(pool.release(SpotId(99)), Err(ReleaseError::NotFound(SpotId(99))));
    }

    #[test]
    fn test_released_spot_is_reused_first() {
        let pool = SpotPool::new(&Inventory::new(2, 0, 0));
        let first = pool.allocate(&car("A", VehicleSize::Small)).unwrap();
        let _second = pool.allocate(&car("B", VehicleSize::Small)).unwrap();
        pool.release(first).unwrap();

        let again = pool.allocate(&car("C", VehicleSize::Small)).unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn test_free_by_type() {
        let pool = SpotPool::new(&Inventory::new(2, 1, 1));
        pool.allocate(&car("A", VehicleSize::Small)).unwrap();
        pool.allocate(&car("B", VehicleSize::Large)).unwrap();

        assert_eq!(
            pool.free_by_type(),
            [(SpotType::Compact, 1), (SpotType::Regular, 1), (SpotType::Oversized, 0)]
        );
    }

    #[test]
    fn test_concurrent_allocation_hands_out_distinct_spots() {
        let pool = SpotPool::new(&Inventory::new(8, 8, 4));
        let results: Vec<Result<SpotId, AllocationError>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..32)
                .map(|i| {
                    let pool = &pool;
                    s.spawn(move || pool.allocate(&car(&format!("T{i}"), VehicleSize::Small)))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let granted: Vec<SpotId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
        let unique: std::collections::HashSet<_> = granted.iter().collect();
        assert_eq!(granted.len(), 20);
        assert_eq!(unique.len(), 20);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 12);
        assert_eq!(pool.occupied_count(), 20);
    }
}
