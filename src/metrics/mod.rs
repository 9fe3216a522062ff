//! Prometheus metrics exporter for the capture controller.
//!
//! Exposes controller activity in Prometheus format, optionally over HTTP
//! (feature `metrics`).
//!
//! # Metrics Exposed
//!
//! ## Position
//! - `capture_fsm_state` - Ordinal of the current state (0=Closed, 4=Preview)
//! - `capture_fsm_generation` - Current session generation
//!
//! ## Activity
//! - `capture_fsm_transitions_total` - State transitions performed
//! - `capture_fsm_stills_delivered_total` - Still images handed to callers
//! - `capture_fsm_pictures_rejected_total` - `take_picture` calls outside preview
//! - `capture_fsm_stills_discarded_total` - Still callbacks dropped unfired
//!
//! ## Failures
//! - `capture_fsm_aborts_total` - Sessions torn down through Abort
//! - `capture_fsm_fatal_shutdowns_total` - Shutdowns forced by device errors
//! - `capture_fsm_stale_events_total` - Events dropped from older sessions
//!
//! # Example
//!
//! ```no_run
//! use capture_fsm::machine::{ControllerStats, State};
//! use capture_fsm::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let stats = ControllerStats::default();
//! registry.update(&MetricsSnapshot::from_controller(&stats, State::Preview, 1));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
