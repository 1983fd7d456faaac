//! Ticket-issuing lot facade
//!
//! `ParkingLot` composes the spot pool, the fare policy and the clock into
//! two workflows:
//! - check-in: allocate a spot, then mint and register a ticket
//! - check-out: remove the ticket, price the stay, then release the spot
//!
//! The ticket registry has its own mutex, separate from the pool's lock. The
//! two are never held at the same time: check-in releases the pool lock
//! before touching the registry, check-out releases the registry lock before
//! touching the pool.

use crate::domain::fare::{billable_hours, FarePolicy, RateTable};
use crate::domain::ticket::{Checkout, Ticket, TicketId};
use crate::domain::types::{SpotId, SpotType, Vehicle};
use crate::infra::clock::{Clock, SystemClock};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::pool::{AllocationError, Inventory, ReleaseError, SpotPool};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckInError {
    #[error("check-in refused: {0}")]
    AllocationFailed(#[from] AllocationError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckoutError {
    #[error("ticket {0} is not active")]
    InvalidTicket(TicketId),
    /// The ticket was settled and priced but its spot could not be freed.
    /// The receipt is kept so the fee can still be collected.
    #[error("ticket settled but its spot could not be released: {source}")]
    ReleaseFailed {
        receipt: Box<Checkout>,
        #[source]
        source: ReleaseError,
    },
}

impl CheckoutError {
    /// Fee computed before the failure, if the ticket got that far
    pub fn fee(&self) -> Option<f64> {
        match self {
            CheckoutError::InvalidTicket(_) => None,
            CheckoutError::ReleaseFailed { receipt, .. } => Some(receipt.fee),
        }
    }
}

pub struct ParkingLot {
    pool: SpotPool,
    /// Live tickets; presence here is the `issued` state
    tickets: Mutex<FxHashMap<TicketId, Ticket>>,
    policy: FarePolicy,
    rates: RateTable,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl ParkingLot {
    pub fn new(
        inventory: &Inventory,
        policy: FarePolicy,
        rates: RateTable,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = SpotPool::new(inventory);
        info!(
            capacity = pool.capacity(),
            compact = inventory.compact,
            regular = inventory.regular,
            oversized = inventory.oversized,
            policy = %policy.as_str(),
            "lot_created"
        );
        Self {
            pool,
            tickets: Mutex::new(FxHashMap::default()),
            policy,
            rates,
            clock,
            metrics: Arc::new(Metrics::new()),
        }
    }

    /// Build a lot from loaded configuration, reading the wall clock
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.inventory(), config.fare_policy(), *config.rates(), Arc::new(SystemClock))
    }

    /// Share an externally owned metrics collector
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Park a vehicle: reserve a spot and issue a ticket for it
    pub fn check_in(&self, vehicle: &Vehicle) -> Result<Ticket, CheckInError> {
        let start = Instant::now();

        let (spot, spot_kind) = match self.pool.allocate_with_kind(vehicle) {
            Ok(reserved) => reserved,
            Err(e) => {
                self.metrics.record_check_in_rejected();
                warn!(plate = %vehicle.plate, size = %vehicle.size, "check_in_no_capacity");
                return Err(e.into());
            }
        };
        let ticket = self.register(vehicle, spot, spot_kind);

        let latency_us = start.elapsed().as_micros() as u64;
        self.metrics.record_check_in(latency_us);
        info!(
            ticket = %ticket.id,
            plate = %ticket.plate,
            spot = %ticket.spot,
            kind = %ticket.spot_kind,
            issued_at = %ticket.issued_at.to_rfc3339(),
            "checked_in"
        );
        Ok(ticket)
    }

    /// Mint a ticket and insert it under the registry lock.
    ///
    /// A UUIDv7 collision is not expected, but an occupied key is never
    /// overwritten: a fresh ID is minted instead.
    fn register(&self, vehicle: &Vehicle, spot: SpotId, spot_kind: SpotType) -> Ticket {
        let now = self.clock.now();
        let mut tickets = self.tickets.lock();
        loop {
            let ticket = Ticket::issue(vehicle, spot, spot_kind, now);
            match tickets.entry(ticket.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(ticket.clone());
                    return ticket;
                }
                Entry::Occupied(_) => {
                    warn!(ticket = %ticket.id, "ticket_id_collision");
                }
            }
        }
    }

    /// Settle a ticket: price the stay and free its spot.
    ///
    /// The billing window ends when this call starts. The ticket leaves the
    /// registry in one step, so of several concurrent checkouts for the same
    /// ticket exactly one gets past the lookup.
    pub fn check_out(&self, ticket_id: &TicketId, vehicle: &Vehicle) -> Result<Checkout, CheckoutError> {
        let start = Instant::now();
        let now = self.clock.now();

        let Some(ticket) = self.tickets.lock().remove(ticket_id) else {
            self.metrics.record_invalid_ticket();
            warn!(ticket = %ticket_id, plate = %vehicle.plate, "check_out_invalid_ticket");
            return Err(CheckoutError::InvalidTicket(ticket_id.clone()));
        };

        if ticket.plate != vehicle.plate {
            warn!(
                ticket = %ticket.id,
                ticket_plate = %ticket.plate,
                presented_plate = %vehicle.plate,
                "check_out_plate_mismatch"
            );
        }

        let duration = ticket.elapsed(now);
        let fee = self.policy.compute(&self.rates, vehicle.size, duration, now);
        let receipt = Checkout {
            billed_hours: billable_hours(duration),
            checked_out_at: now,
            duration,
            fee,
            ticket,
        };

        if let Err(source) = self.pool.release(receipt.ticket.spot) {
            // the ticket is billed even though its spot is out of step
            let latency_us = start.elapsed().as_micros() as u64;
            self.metrics.record_check_out(receipt.billed_hours, receipt.fee, latency_us);
            self.metrics.record_release_failure();
            error!(
                ticket = %receipt.ticket.id,
                spot = %receipt.ticket.spot,
                fee = %receipt.fee,
                error = %source,
                "check_out_release_failed"
            );
            return Err(CheckoutError::ReleaseFailed { receipt: Box::new(receipt), source });
        }

        let latency_us = start.elapsed().as_micros() as u64;
        self.metrics.record_check_out(receipt.billed_hours, receipt.fee, latency_us);
        info!(
            ticket = %receipt.ticket.id,
            plate = %receipt.ticket.plate,
            spot = %receipt.ticket.spot,
            minutes = %receipt.duration.num_minutes(),
            billed_hours = %receipt.billed_hours,
            fee = format!("{:.2}", receipt.fee),
            "checked_out"
        );
        Ok(receipt)
    }

    /// Live ticket by ID
    pub fn ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.lock().get(id).cloned()
    }

    /// Number of live tickets
    pub fn active_tickets(&self) -> usize {
        self.tickets.lock().len()
    }

    /// Spots bound to live tickets
    pub fn bound_spots(&self) -> Vec<SpotId> {
        self.tickets.lock().values().map(|t| t.spot).collect()
    }

    #[inline]
    pub fn pool(&self) -> &SpotPool {
        &self.pool
    }

    #[inline]
    pub fn policy(&self) -> FarePolicy {
        self.policy
    }

    #[inline]
    pub fn rates(&self) -> &RateTable {
        &self.rates
    }

    #[inline]
    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
