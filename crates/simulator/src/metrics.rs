//! Metrics collection and reporting.

use crate::error::SimulatorError;
use citygate_simulation::{PhaseChange, SimulationStats};
use citygate_types::{Phase, ProcessId, ResourceId};
use hdrhistogram::Histogram;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Longest wait the latency histogram tracks exactly, in microseconds.
/// Longer waits are recorded at this bound.
const MAX_TRACKED_WAIT_MICROS: u64 = 3_600_000_000;

/// Collects per-grant metrics from the phase changes of a run.
pub struct MetricsCollector {
    /// When each process started its outstanding request.
    request_started: HashMap<ProcessId, Duration>,

    /// Time from request to entry, in microseconds.
    wait_latency: Histogram<u64>,

    grants_per_resource: BTreeMap<ResourceId, u64>,
    grants_per_process: BTreeMap<ProcessId, u64>,

    /// Quorums that completed while the city was still cooling down.
    cooldown_waits: u64,
}

impl MetricsCollector {
    /// Create an empty collector.
    pub fn new() -> Result<Self, SimulatorError> {
        Ok(Self {
            request_started: HashMap::new(),
            wait_latency: Histogram::new_with_bounds(1, MAX_TRACKED_WAIT_MICROS, 3)?,
            grants_per_resource: BTreeMap::new(),
            grants_per_process: BTreeMap::new(),
            cooldown_waits: 0,
        })
    }

    /// Record one phase change.
    pub fn record(&mut self, change: &PhaseChange) {
        match change.to {
            Phase::Requesting => {
                self.request_started.insert(change.process, change.time);
            }
            Phase::Waiting => self.cooldown_waits += 1,
            Phase::InResource => {
                if let Some(started) = self.request_started.remove(&change.process) {
                    let waited = change.time.saturating_sub(started);
                    self.wait_latency.saturating_record(waited.as_micros() as u64);
                }
                *self.grants_per_process.entry(change.process).or_default() += 1;
                if let Some(resource) = change.resource {
                    *self.grants_per_resource.entry(resource).or_default() += 1;
                }
            }
            Phase::Idle => {}
        }
    }

    /// Processes still waiting for a grant.
    pub fn outstanding_requests(&self) -> usize {
        self.request_started.len()
    }

    /// Build the report for a run of `duration`.
    pub fn finish(
        &self,
        duration: Duration,
        stats: &SimulationStats,
        violations: usize,
    ) -> SimulationReport {
        let percentile = |q: f64| {
            if self.wait_latency.is_empty() {
                Duration::ZERO
            } else {
                Duration::from_micros(self.wait_latency.value_at_quantile(q))
            }
        };

        SimulationReport {
            duration,
            grants: self.grants_per_process.values().sum(),
            grants_per_resource: self.grants_per_resource.clone(),
            grants_per_process: self.grants_per_process.clone(),
            cooldown_waits: self.cooldown_waits,
            outstanding_requests: self.outstanding_requests(),
            p50_wait: percentile(0.50),
            p90_wait: percentile(0.90),
            p99_wait: percentile(0.99),
            max_wait: Duration::from_micros(self.wait_latency.max()),
            messages_sent: stats.messages_sent,
            messages_by_type: stats.messages_by_type.clone(),
            violations,
        }
    }
}

/// Summary of a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// Simulated time covered.
    pub duration: Duration,

    /// Total entries into a city.
    pub grants: u64,
    pub grants_per_resource: BTreeMap<ResourceId, u64>,
    pub grants_per_process: BTreeMap<ProcessId, u64>,

    /// Quorums that had to wait for a cooldown.
    pub cooldown_waits: u64,

    /// Requests not yet granted when the run ended.
    pub outstanding_requests: usize,

    /// Request-to-entry latency percentiles.
    pub p50_wait: Duration,
    pub p90_wait: Duration,
    pub p99_wait: Duration,
    pub max_wait: Duration,

    /// Point-to-point messages sent.
    pub messages_sent: u64,
    pub messages_by_type: BTreeMap<&'static str, u64>,

    /// Mutual-exclusion violations. Anything but zero is a bug.
    pub violations: usize,
}

impl SimulationReport {
    /// Grants per simulated minute.
    pub fn grants_per_minute(&self) -> f64 {
        let minutes = self.duration.as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        self.grants as f64 / minutes
    }

    /// 99th percentile wait.
    pub fn p99_wait(&self) -> Duration {
        self.p99_wait
    }

    /// Messages sent per grant.
    pub fn messages_per_grant(&self) -> f64 {
        if self.grants == 0 {
            return 0.0;
        }
        self.messages_sent as f64 / self.grants as f64
    }

    /// Print a human-readable summary to stdout.
    pub fn print(&self) {
        println!("=== Simulation Report ===");
        println!("Simulated time:       {:?}", self.duration);
        println!("Grants:               {}", self.grants);
        println!("Grants/min:           {:.2}", self.grants_per_minute());
        println!("Cooldown waits:       {}", self.cooldown_waits);
        println!("Outstanding requests: {}", self.outstanding_requests);
        println!();
        println!("Wait latency:");
        println!("  P50: {:?}", self.p50_wait);
        println!("  P90: {:?}", self.p90_wait);
        println!("  P99: {:?}", self.p99_wait);
        println!("  Max: {:?}", self.max_wait);
        println!();
        println!("Grants per city:");
        for (resource, grants) in &self.grants_per_resource {
            println!("  {resource}: {grants}");
        }
        println!("Grants per process:");
        for (process, grants) in &self.grants_per_process {
            println!("  {process}: {grants}");
        }
        println!();
        println!(
            "Messages: {} ({:.1} per grant)",
            self.messages_sent,
            self.messages_per_grant()
        );
        for (kind, count) in &self.messages_by_type {
            println!("  {kind}: {count}");
        }
        println!();
        println!("Safety violations:    {}", self.violations);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citygate_types::Timestamp;

    fn change(secs: u64, process: u32, to: Phase) -> PhaseChange {
        PhaseChange {
            time: Duration::from_secs(secs),
            process: ProcessId(process),
            resource: Some(ResourceId(1)),
            from: Phase::Idle,
            to,
            clock: Timestamp(secs),
        }
    }

    #[test]
    fn test_wait_is_request_to_entry() {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record(&change(1, 0, Phase::Requesting));
        metrics.record(&change(2, 1, Phase::Requesting));
        metrics.record(&change(4, 0, Phase::InResource));
        metrics.record(&change(9, 1, Phase::Waiting));
        metrics.record(&change(12, 1, Phase::InResource));

        let report = metrics.finish(Duration::from_secs(60), &SimulationStats::default(), 0);
        assert_eq!(report.grants, 2);
        assert_eq!(report.grants_per_resource.get(&ResourceId(1)), Some(&2));
        assert_eq!(report.cooldown_waits, 1);
        assert_eq!(report.outstanding_requests, 0);
        // 3s and 10s, within histogram precision.
        assert!(report.max_wait >= Duration::from_millis(9_990));
        assert!(report.p50_wait <= Duration::from_millis(3_010));
        assert!((report.grants_per_minute() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_waits_beyond_an_hour_saturate() {
        let mut metrics = MetricsCollector::new().unwrap();
        metrics.record(&change(0, 0, Phase::Requesting));
        metrics.record(&change(7_200, 0, Phase::InResource));

        let report = metrics.finish(Duration::from_secs(7_200), &SimulationStats::default(), 0);
        assert!(report.max_wait >= Duration::from_secs(3_599));
        assert!(report.max_wait <= Duration::from_secs(3_605));
    }

    #[test]
    fn test_empty_run_reports_zeroes() {
        let metrics = MetricsCollector::new().unwrap();
        let report = metrics.finish(Duration::ZERO, &SimulationStats::default(), 0);
        assert_eq!(report.grants, 0);
        assert_eq!(report.p99_wait(), Duration::ZERO);
        assert_eq!(report.grants_per_minute(), 0.0);
        assert_eq!(report.messages_per_grant(), 0.0);
    }
}
