//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics on the check-in/check-out path so recording never contends
//! with the pool or registry locks. `report()` swaps the periodic counters
//! to zero and returns a snapshot.
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Latency bucket boundaries (microseconds)
/// Buckets: ≤1, ≤2, ≤5, ≤10, ≤20, ≤50, ≤100, ≤200, ≤500, ≤1000, >1000
const BUCKET_BOUNDS: [u64; 10] = [1, 2, 5, 10, 20, 50, 100, 200, 500, 1000];
const NUM_BUCKETS: usize = 11;

/// Upper bounds used for percentiles (last bucket uses 2x the previous bound)
const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] = [1, 2, 5, 10, 20, 50, 100, 200, 500, 1000, 2000];

#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Periodic latency histogram (reset on report)
struct LatencyHistogram {
    buckets: [AtomicU64; NUM_BUCKETS],
    sum_us: AtomicU64,
    max_us: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_us: AtomicU64::new(0),
            max_us: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record(&self, latency_us: u64) {
        self.buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.max_us, latency_us);
    }

    fn take(&self) -> LatencySummary {
        let mut buckets = [0u64; NUM_BUCKETS];
        for (i, bucket) in self.buckets.iter().enumerate() {
            buckets[i] = bucket.swap(0, Ordering::Relaxed);
        }
        let count: u64 = buckets.iter().sum();
        let sum = self.sum_us.swap(0, Ordering::Relaxed);
        LatencySummary {
            count,
            avg_us: if count > 0 { sum / count } else { 0 },
            max_us: self.max_us.swap(0, Ordering::Relaxed),
            p50_us: percentile_from_buckets(&buckets, 0.50),
            p99_us: percentile_from_buckets(&buckets, 0.99),
            buckets,
        }
    }
}

/// Lock-free metrics collector for a lot
pub struct Metrics {
    /// Tickets issued (monotonic)
    check_ins_total: AtomicU64,
    /// Check-ins refused for lack of a fitting spot (monotonic)
    check_ins_rejected: AtomicU64,
    /// Tickets settled (monotonic)
    check_outs_total: AtomicU64,
    /// Checkouts presenting an unknown or already settled ticket (monotonic)
    invalid_tickets_total: AtomicU64,
    /// Checkouts whose spot release failed after settling (monotonic)
    release_failures_total: AtomicU64,
    /// Sum of billed hours (monotonic)
    billed_hours_total: AtomicU64,
    /// Sum of fees charged, in cents (monotonic)
    revenue_cents_total: AtomicU64,
    check_in_latency: LatencyHistogram,
    check_out_latency: LatencyHistogram,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            check_ins_total: AtomicU64::new(0),
            check_ins_rejected: AtomicU64::new(0),
            check_outs_total: AtomicU64::new(0),
            invalid_tickets_total: AtomicU64::new(0),
            release_failures_total: AtomicU64::new(0),
            billed_hours_total: AtomicU64::new(0),
            revenue_cents_total: AtomicU64::new(0),
            check_in_latency: LatencyHistogram::new(),
            check_out_latency: LatencyHistogram::new(),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_check_in(&self, latency_us: u64) {
        self.check_ins_total.fetch_add(1, Ordering::Relaxed);
        self.check_in_latency.record(latency_us);
    }

    #[inline]
    pub fn record_check_in_rejected(&self) {
        self.check_ins_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a settled ticket and its fee
    #[inline]
    pub fn record_check_out(&self, billed_hours: u64, fee: f64, latency_us: u64) {
        self.check_outs_total.fetch_add(1, Ordering::Relaxed);
        self.billed_hours_total.fetch_add(billed_hours, Ordering::Relaxed);
        let cents = (fee * 100.0).round().max(0.0) as u64;
        self.revenue_cents_total.fetch_add(cents, Ordering::Relaxed);
        self.check_out_latency.record(latency_us);
    }

    #[inline]
    pub fn record_invalid_ticket(&self) {
        self.invalid_tickets_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_release_failure(&self) {
        self.release_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn check_ins_total(&self) -> u64 {
        self.check_ins_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn check_outs_total(&self) -> u64 {
        self.check_outs_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn invalid_tickets_total(&self) -> u64 {
        self.invalid_tickets_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn release_failures_total(&self) -> u64 {
        self.release_failures_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn revenue_cents_total(&self) -> u64 {
        self.revenue_cents_total.load(Ordering::Relaxed)
    }

    /// Snapshot the counters and reset the periodic latency histograms
    pub fn report(&self, occupied_spots: usize, active_tickets: usize) -> MetricsSummary {
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let check_in = self.check_in_latency.take();
        let check_out = self.check_out_latency.take();

        let secs = elapsed.as_secs_f64();
        let check_ins_per_sec = if secs > 0.0 { check_in.count as f64 / secs } else { 0.0 };

        MetricsSummary {
            check_ins_total: self.check_ins_total.load(Ordering::Relaxed),
            check_ins_rejected: self.check_ins_rejected.load(Ordering::Relaxed),
            check_outs_total: self.check_outs_total.load(Ordering::Relaxed),
            invalid_tickets_total: self.invalid_tickets_total.load(Ordering::Relaxed),
            release_failures_total: self.release_failures_total.load(Ordering::Relaxed),
            billed_hours_total: self.billed_hours_total.load(Ordering::Relaxed),
            revenue_cents_total: self.revenue_cents_total.load(Ordering::Relaxed),
            check_ins_per_sec,
            check_in,
            check_out,
            occupied_spots,
            active_tickets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct LatencySummary {
    pub count: u64,
    pub avg_us: u64,
    pub max_us: u64,
    pub p50_us: u64,
    pub p99_us: u64,
    /// Bounds: ≤1, ≤2, ≤5, ≤10, ≤20, ≤50, ≤100, ≤200, ≤500, ≤1000, >1000 µs
    pub buckets: [u64; NUM_BUCKETS],
}

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub check_ins_total: u64,
    pub check_ins_rejected: u64,
    pub check_outs_total: u64,
    pub invalid_tickets_total: u64,
    pub release_failures_total: u64,
    pub billed_hours_total: u64,
    pub revenue_cents_total: u64,
    pub check_ins_per_sec: f64,
    pub check_in: LatencySummary,
    pub check_out: LatencySummary,
    /// Spots occupied at report time
    pub occupied_spots: usize,
    /// Live tickets at report time
    pub active_tickets: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            check_ins = %self.check_ins_total,
            rejected = %self.check_ins_rejected,
            check_outs = %self.check_outs_total,
            invalid_tickets = %self.invalid_tickets_total,
            release_failures = %self.release_failures_total,
            revenue = format!("{:.2}", self.revenue_cents_total as f64 / 100.0),
            check_ins_per_sec = format!("{:.1}", self.check_ins_per_sec),
            check_in_p99_us = %self.check_in.p99_us,
            check_out_p99_us = %self.check_out.p99_us,
            occupied = %self.occupied_spots,
            active_tickets = %self.active_tickets,
            "metrics"
        );
    }
}
