//! The capture state machine.
//!
//! States and their hooks live in [`state`]; the hooks only describe work as
//! [`Effect`]s, which [`Controller`] carries out against the device traits.
//!
//! ```text
//! Closed → InitSurface → OpenDevice → CreateSession → Preview
//!                                                       ↓ take_picture
//!                        Preview ← TakePicture ← AutoExposure ← AutoFocus
//!
//! any live state --close/disconnect/fault--> Abort → Closed
//! ```

mod controller;
mod effect;
mod session;
mod state;

pub use controller::{
    Controller, ControllerError, ControllerStats, OnImageReady, TransitionListener,
};
pub use effect::{Effect, Step};
pub use session::{Selection, Session};
pub use state::{Environment, State};
