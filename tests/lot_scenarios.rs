//! End-to-end check-in/check-out scenarios against the public API

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use lotkeeper::domain::{FarePolicy, RateTable, SpotId, SpotType, Ticket, Vehicle, VehicleSize};
use lotkeeper::infra::{Clock, ManualClock, SystemClock};
use lotkeeper::services::{AllocationError, CheckInError, CheckoutError, Inventory, ParkingLot};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};

fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2026, 6, 12, h, m, 0).unwrap()
}

fn small(plate: &str) -> Vehicle {
    Vehicle::new(plate, VehicleSize::Small)
}

/// Occupied spots match live tickets one to one
fn assert_consistent(lot: &ParkingLot) {
    let bound = lot.bound_spots();
    let unique: HashSet<SpotId> = bound.iter().copied().collect();
    assert_eq!(unique.len(), bound.len(), "two live tickets share a spot");
    assert_eq!(lot.pool().occupied_count(), lot.active_tickets());
}

#[test]
fn small_vehicles_spill_upward_until_full() {
    let clock = Arc::new(ManualClock::new(at(10, 0)));
    let lot = ParkingLot::new(&Inventory::new(2, 2, 1), FarePolicy::Base, RateTable::default(), clock);

    let tickets: Vec<Ticket> = (0..3).map(|i| lot.check_in(&small(&format!("A{i}"))).unwrap()).collect();
    assert_eq!(tickets[0].spot_kind, SpotType::Compact);
    assert_eq!(tickets[1].spot_kind, SpotType::Compact);
    // compact exhausted
    assert_eq!(tickets[2].spot_kind, SpotType::Regular);

    let fourth = lot.check_in(&small("A3")).unwrap();
    assert_eq!(fourth.spot_kind, SpotType::Regular);
    let fifth = lot.check_in(&small("A4")).unwrap();
    assert_eq!(fifth.spot_kind, SpotType::Oversized);

    let before = lot.pool().snapshot();
    let err = lot.check_in(&small("A5")).unwrap_err();
    assert_eq!(
        err,
        CheckInError::AllocationFailed(AllocationError::NoCapacity { size: VehicleSize::Small })
    );
    assert_eq!(lot.pool().snapshot(), before);
    assert_consistent(&lot);
}

#[test]
fn peak_half_hour_medium_costs_thirty() {
    let clock = Arc::new(ManualClock::new(at(18, 0)));
    let lot = ParkingLot::new(&Inventory::new(2, 2, 1), FarePolicy::Peak, RateTable::default(), clock.clone());
    let van = Vehicle::new("VAN-1", VehicleSize::Medium);

    let ticket = lot.check_in(&van).unwrap();
    clock.advance(Duration::minutes(30));
    let receipt = lot.check_out(&ticket.id, &van).unwrap();

    assert_eq!(receipt.fee, 30.0);
    assert_eq!(receipt.billed_hours, 1);
    assert_eq!(receipt.duration, Duration::minutes(30));
}

#[test]
fn sub_hour_stay_bills_one_hour_off_peak() {
    let clock = Arc::new(ManualClock::new(at(9, 0)));
    let lot = ParkingLot::new(&Inventory::new(1, 0, 0), FarePolicy::Peak, RateTable::default(), clock.clone());
    let car = small("B-1");

    for minutes in [0, 1, 30, 59] {
        clock.set(at(9, 0));
        let ticket = lot.check_in(&car).unwrap();
        clock.advance(Duration::minutes(minutes));
        let receipt = lot.check_out(&ticket.id, &car).unwrap();
        assert_eq!(receipt.billed_hours, 1, "{minutes} minutes");
        assert_eq!(receipt.fee, 10.0, "{minutes} minutes");
    }
}

#[test]
fn settled_ticket_cannot_be_reused() {
    let clock = Arc::new(ManualClock::new(at(12, 0)));
    let lot = ParkingLot::new(&Inventory::new(1, 1, 0), FarePolicy::Base, RateTable::default(), clock);
    let car = small("C-1");

    let ticket = lot.check_in(&car).unwrap();
    lot.check_out(&ticket.id, &car).unwrap();

    assert!(!lot.pool().spot(ticket.spot).unwrap().is_occupied());
    assert!(lot.ticket(&ticket.id).is_none());
    assert!(matches!(lot.check_out(&ticket.id, &car), Err(CheckoutError::InvalidTicket(_))));
    assert_consistent(&lot);
}

#[test]
fn concurrent_checkouts_of_one_ticket_settle_once() {
    let lot = ParkingLot::new(
        &Inventory::new(1, 0, 0),
        FarePolicy::Base,
        RateTable::default(),
        Arc::new(SystemClock) as Arc<dyn Clock>,
    );
    let car = small("D-1");

    for _ in 0..50 {
        let ticket = lot.check_in(&car).unwrap();
        let barrier = Barrier::new(4);
        let outcomes: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let (lot, barrier, ticket, car) = (&lot, &barrier, &ticket, &car);
                    s.spawn(move || {
                        barrier.wait();
                        match lot.check_out(&ticket.id, &car) {
                            Ok(_) => true,
                            Err(CheckoutError::InvalidTicket(_)) => false,
                            Err(other) => panic!("unexpected {other:?}"),
                        }
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
        assert_consistent(&lot);
    }
    assert_eq!(lot.metrics().check_outs_total(), 50);
    assert_eq!(lot.metrics().invalid_tickets_total(), 150);
}

#[test]
fn concurrent_traffic_keeps_pool_and_registry_in_step() {
    let lot = Arc::new(ParkingLot::new(
        &Inventory::new(4, 4, 2),
        FarePolicy::Peak,
        RateTable::default(),
        Arc::new(SystemClock),
    ));

    std::thread::scope(|s| {
        for worker in 0..8 {
            let lot = &lot;
            s.spawn(move || {
                for round in 0..200 {
                    let size = VehicleSize::ALL[(worker + round) % 3];
                    let vehicle = Vehicle::new(format!("W{worker}-{round}"), size);
                    if let Ok(ticket) = lot.check_in(&vehicle) {
                        assert!(ticket.spot_kind.fits(size));
                        let receipt = lot.check_out(&ticket.id, &vehicle).unwrap();
                        assert!(receipt.fee > 0.0);
                    }
                }
            });
        }
    });

    assert_eq!(lot.active_tickets(), 0);
    assert_eq!(lot.pool().occupied_count(), 0);
    assert_eq!(lot.metrics().release_failures_total(), 0);
    assert_eq!(lot.metrics().check_ins_total(), lot.metrics().check_outs_total());
}

#[test]
fn concurrent_check_ins_never_share_a_spot() {
    let lot = ParkingLot::new(&Inventory::new(3, 3, 3), FarePolicy::Base, RateTable::default(), Arc::new(SystemClock));

    let tickets: Vec<Ticket> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let lot = &lot;
                s.spawn(move || lot.check_in(&Vehicle::new(format!("P{i}"), VehicleSize::Small)).ok())
            })
            .collect();
        handles.into_iter().filter_map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(tickets.len(), 9);
    let spots: HashSet<SpotId> = tickets.iter().map(|t| t.spot).collect();
    assert_eq!(spots.len(), 9);
    let ids: HashSet<_> = tickets.iter().map(|t| t.id.clone()).collect();
    assert_eq!(ids.len(), 9);
    assert_consistent(&lot);
}
