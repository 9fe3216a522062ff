//! Metrics collection and registry.

use crate::machine::{ControllerStats, State};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The Prometheus registry rejected an operation.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of controller activity for a metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Current state.
    pub state: State,
    /// Current session generation.
    pub generation: u64,
    /// Transitions performed, Abort and Closed included.
    pub transitions: u64,
    /// Still images handed to callers.
    pub stills_delivered: u64,
    /// Still callbacks dropped before their image arrived.
    pub stills_discarded: u64,
    /// Times the machine entered Abort.
    pub aborts: u64,
    /// Hook failures that forced a shutdown.
    pub fatal_shutdowns: u64,
    /// Events dropped for belonging to an older generation.
    pub stale_events: u64,
    /// `take_picture` calls refused outside Preview.
    pub pictures_rejected: u64,
}

impl MetricsSnapshot {
    /// Creates a snapshot from a controller's counters and position.
    pub fn from_controller(stats: &ControllerStats, state: State, generation: u64) -> Self {
        Self {
            state,
            generation,
            transitions: stats.transitions,
            stills_delivered: stats.stills_delivered,
            stills_discarded: stats.stills_discarded,
            aborts: stats.aborts,
            fatal_shutdowns: stats.fatal_shutdowns,
            stale_events: stats.stale_events,
            pictures_rejected: stats.pictures_rejected,
        }
    }
}

/// Prometheus metrics registry for the capture controller.
pub struct MetricsRegistry {
    registry: Registry,

    state: IntGauge,
    generation: IntGauge,

    transitions_total: IntCounter,
    stills_delivered_total: IntCounter,
    stills_discarded_total: IntCounter,
    aborts_total: IntCounter,
    fatal_shutdowns_total: IntCounter,
    stale_events_total: IntCounter,
    pictures_rejected_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new registry with all controller metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let state = IntGauge::new(
            "capture_fsm_state",
            "Current state ordinal (0=Closed, 4=Preview, 7=TakePicture)",
        )?;
        let generation = IntGauge::new("capture_fsm_generation", "Current session generation")?;

        let transitions_total = IntCounter::new(
            "capture_fsm_transitions_total",
            "Total state transitions performed",
        )?;
        let stills_delivered_total = IntCounter::new(
            "capture_fsm_stills_delivered_total",
            "Total still images delivered to callers",
        )?;
        let stills_discarded_total = IntCounter::new(
            "capture_fsm_stills_discarded_total",
            "Total still callbacks dropped before their image arrived",
        )?;
        let aborts_total = IntCounter::new(
            "capture_fsm_aborts_total",
            "Total sessions torn down through Abort",
        )?;
        let fatal_shutdowns_total = IntCounter::new(
            "capture_fsm_fatal_shutdowns_total",
            "Total shutdowns forced by device access failures",
        )?;
        let stale_events_total = IntCounter::new(
            "capture_fsm_stale_events_total",
            "Total events dropped from superseded sessions",
        )?;
        let pictures_rejected_total = IntCounter::new(
            "capture_fsm_pictures_rejected_total",
            "Total take_picture calls refused outside preview",
        )?;

        registry.register(Box::new(state.clone()))?;
        registry.register(Box::new(generation.clone()))?;
        registry.register(Box::new(transitions_total.clone()))?;
        registry.register(Box::new(stills_delivered_total.clone()))?;
        registry.register(Box::new(stills_discarded_total.clone()))?;
        registry.register(Box::new(aborts_total.clone()))?;
        registry.register(Box::new(fatal_shutdowns_total.clone()))?;
        registry.register(Box::new(stale_events_total.clone()))?;
        registry.register(Box::new(pictures_rejected_total.clone()))?;

        Ok(Self {
            registry,
            state,
            generation,
            transitions_total,
            stills_delivered_total,
            stills_discarded_total,
            aborts_total,
            fatal_shutdowns_total,
            stale_events_total,
            pictures_rejected_total,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.state.set(snapshot.state.ordinal());
        self.generation.set(snapshot.generation as i64);

        // Counters only move forward by the difference
        advance(&self.transitions_total, snapshot.transitions);
        advance(&self.stills_delivered_total, snapshot.stills_delivered);
        advance(&self.stills_discarded_total, snapshot.stills_discarded);
        advance(&self.aborts_total, snapshot.aborts);
        advance(&self.fatal_shutdowns_total, snapshot.fatal_shutdowns);
        advance(&self.stale_events_total, snapshot.stale_events);
        advance(&self.pictures_rejected_total, snapshot.pictures_rejected);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();
        let stats = ControllerStats {
            opens: 1,
            transitions: 8,
            aborts: 1,
            stills_delivered: 2,
            stills_discarded: 1,
            ..Default::default()
        };

        registry.update(&MetricsSnapshot::from_controller(&stats, State::Preview, 3));

        let output = registry.encode().unwrap();
        assert!(output.contains("capture_fsm_state 4"));
        assert!(output.contains("capture_fsm_generation 3"));
        assert!(output.contains("capture_fsm_transitions_total 8"));
        assert!(output.contains("capture_fsm_stills_delivered_total 2"));
        assert!(output.contains("capture_fsm_stills_discarded_total 1"));
    }

    #[test]
    fn test_counters_never_go_back() {
        let registry = MetricsRegistry::new().unwrap();
        let mut snapshot = MetricsSnapshot {
            aborts: 5,
            ..Default::default()
        };
        registry.update(&snapshot);
        snapshot.aborts = 2;
        registry.update(&snapshot);

        assert!(registry.encode().unwrap().contains("capture_fsm_aborts_total 5"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("capture_fsm_state"));
        assert!(output.contains("capture_fsm_stale_events_total"));
        assert!(output.contains("capture_fsm_pictures_rejected_total"));
    }
}
