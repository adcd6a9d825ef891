//! Simulator runner.

use crate::config::SimulatorConfig;
use crate::error::SimulatorError;
use crate::metrics::{MetricsCollector, SimulationReport};
use citygate_simulation::SimulationRunner;
use std::time::Duration;
use tracing::{info, warn};

/// Metrics are folded in after every slice of simulated time.
const REPORT_SLICE: Duration = Duration::from_secs(10);

/// Long-running simulator.
pub struct Simulator {
    config: SimulatorConfig,
    runner: SimulationRunner,
    metrics: MetricsCollector,
    elapsed: Duration,
}

impl Simulator {
    /// Create a simulator from its configuration.
    pub fn new(config: SimulatorConfig) -> Result<Self, SimulatorError> {
        let runner = SimulationRunner::new(
            config.to_network_config(),
            config.to_node_config(),
            config.seed,
        )?;
        Ok(Self {
            runner,
            metrics: MetricsCollector::new()?,
            elapsed: Duration::ZERO,
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Get the underlying simulation runner.
    pub fn runner(&self) -> &SimulationRunner {
        &self.runner
    }

    /// Run for `duration` of simulated time and report on the whole run so far.
    pub fn run_for(&mut self, duration: Duration) -> SimulationReport {
        info!(
            processes = self.config.num_processes,
            cities = self.config.num_resources,
            duration = ?duration,
            seed = self.config.seed,
            "Starting simulation"
        );

        let end = self.elapsed + duration;
        while self.elapsed < end {
            let slice = REPORT_SLICE.min(end - self.elapsed);
            self.runner.run_for(slice);
            self.elapsed += slice;
            for change in self.runner.take_phase_changes() {
                self.metrics.record(&change);
            }
        }

        let violations = self.runner.violations().len();
        if violations > 0 {
            warn!(violations, "Mutual exclusion was violated during the run");
        }

        let report = self
            .metrics
            .finish(self.elapsed, self.runner.stats(), violations);
        info!(
            grants = report.grants,
            messages = report.messages_sent,
            p99_wait = ?report.p99_wait,
            "Simulation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn test_report_covers_whole_run() {
        let config = SimulatorConfig::new(4, 2)
            .with_request_probability(0.3)
            .with_seed(5);
        let mut simulator = Simulator::new(config).unwrap();
        let first = simulator.run_for(Duration::from_secs(25));
        let second = simulator.run_for(Duration::from_secs(35));

        assert_eq!(second.duration, Duration::from_secs(60));
        assert!(second.grants >= first.grants);
        assert!(second.grants > 0);
        assert_eq!(second.violations, 0);
        assert_eq!(
            second.grants_per_resource.values().sum::<u64>(),
            second.grants
        );
    }

    #[test]
    fn test_invalid_group_rejected() {
        assert!(matches!(
            Simulator::new(SimulatorConfig::new(3, 0)),
            Err(SimulatorError::Topology(_))
        ));
    }
}
