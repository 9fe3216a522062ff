//! Camera Still-Capture Controller
//!
//! A finite-state controller that drives a camera through device open,
//! session setup, continuous preview and a focus → exposure → still capture
//! sequence, then back to preview or down to a full shutdown.
//!
//! # Architecture
//!
//! ```text
//! caller ──open/take_picture/close──▶ machine::Controller ──effects──▶ device traits
//!                                           ▲                              │
//!                                           └──── dispatch::SerialQueue ◀──┘
//!                                                (completions, results)
//! ```
//!
//! # Design Principles
//!
//! - **Run to completion**: a transition (exit, entry, follow-up) finishes
//!   before the next event is looked at
//! - **Exit always runs**: leaving TakePicture restores the repeating request
//!   no matter what replaces it
//! - **Single fatal path**: any device error inside a hook releases every
//!   handle and lands in Closed
//! - **Generations, not identity**: callbacks from a previous session are
//!   dropped by comparing generation counters
//!
//! # Example
//!
//! ```no_run
//! use capture_fsm::{
//!     config::ControllerConfig,
//!     device::{MockDevice, MockTarget},
//!     machine::{Controller, State},
//! };
//!
//! let mut controller = Controller::new(MockDevice::new(), ControllerConfig::default()).unwrap();
//! controller.open(MockTarget::available()).unwrap();
//!
//! // Let the device finish opening and configuring.
//! controller.backend_mut().complete_open();
//! controller.dispatch_pending();
//! controller.backend_mut().configure_session();
//! controller.dispatch_pending();
//! assert_eq!(controller.state(), State::Preview);
//!
//! controller.take_picture(|image| println!("got {} bytes", image.data().len()));
//! controller.close();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod machine;
pub mod metrics;

// Re-export commonly used types at crate root
pub use capture::{CaptureRequest, CaptureResult};
pub use config::{ConfigError, ControllerConfig, FileConfig, SimulatorConfig};
pub use device::{
    CaptureTarget, DeviceError, DeviceSession, ImageSink, MockDevice, MockTarget, StillImage,
};
pub use dispatch::{Event, Generation, SerialQueue};
pub use machine::{Controller, ControllerError, State};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
