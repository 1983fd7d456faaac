//! lotkeeper - parking lot allocation demo
//!
//! Builds a lot from a TOML config and drives simulated vehicles through
//! check-in and check-out concurrently, reporting metrics as it goes.
//!
//! Module structure:
//! - `domain/` - Core types (Vehicle, Spot, Ticket, FarePolicy)
//! - `services/` - Business logic (SpotPool, ParkingLot)
//! - `infra/` - Infrastructure (Config, Clock, Metrics)

use clap::Parser;
use lotkeeper::domain::{Vehicle, VehicleSize};
use lotkeeper::infra::{Config, Metrics};
use lotkeeper::services::{CheckoutError, ParkingLot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// lotkeeper - spot allocation and ticketing demo
#[derive(Parser, Debug)]
#[command(name = "lotkeeper", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the number of simulated vehicles
    #[arg(long)]
    vehicles: Option<usize>,
}

/// Staggered arrival offset of the `index`-th simulated vehicle
fn arrival_delay(interval: Duration, index: usize) -> Duration {
    interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging, level via RUST_LOG (default: info)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "lotkeeper starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path);

    let inventory = config.inventory();
    info!(
        config_file = %config.config_file(),
        lot_id = %config.lot_id(),
        compact = inventory.compact,
        regular = inventory.regular,
        oversized = inventory.oversized,
        policy = %config.fare_policy().as_str(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());
    let lot = Arc::new(ParkingLot::from_config(&config).with_metrics(metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Periodic metrics reporter
    let reporter_lot = lot.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = reporter_lot
                .metrics()
                .report(reporter_lot.pool().occupied_count(), reporter_lot.active_tickets());
            summary.log();
        }
    });

    // Ctrl+C cuts every stay short
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let vehicles = args.vehicles.unwrap_or(config.sim_vehicles());
    let arrival = Duration::from_millis(config.sim_arrival_interval_ms());
    let stay = Duration::from_millis(config.sim_stay_ms());

    let mut handles = Vec::with_capacity(vehicles);
    for i in 0..vehicles {
        let lot = lot.clone();
        let mut shutdown = shutdown_rx.clone();
        let vehicle = Vehicle::new(format!("SIM-{i:03}"), VehicleSize::ALL[i % VehicleSize::ALL.len()]);
        let delay = arrival_delay(arrival, i);

        handles.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let ticket = match lot.check_in(&vehicle) {
                Ok(ticket) => ticket,
                Err(e) => {
                    warn!(plate = %vehicle.plate, error = %e, "sim_vehicle_turned_away");
                    return;
                }
            };

            if !*shutdown.borrow() {
                tokio::select! {
                    _ = tokio::time::sleep(stay) => {}
                    _ = shutdown.changed() => {}
                }
            }

            match lot.check_out(&ticket.id, &vehicle) {
                Ok(receipt) => info!(plate = %vehicle.plate, fee = format!("{:.2}", receipt.fee), "sim_vehicle_left"),
                Err(CheckoutError::ReleaseFailed { receipt, source }) => error!(
                    plate = %vehicle.plate,
                    fee = format!("{:.2}", receipt.fee),
                    error = %source,
                    "sim_vehicle_left_unreconciled"
                ),
                Err(e) => error!(plate = %vehicle.plate, error = %e, "sim_check_out_failed"),
            }
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "sim_task_panicked");
        }
    }

    metrics.report(lot.pool().occupied_count(), lot.active_tickets()).log();
    info!("lotkeeper shutdown complete");
    Ok(())
}
