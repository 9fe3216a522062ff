//! Camera hardware seen through narrow collaborator traits.
//!
//! The controller never talks to a driver. It drives whatever implements
//! [`DeviceSession`], [`ImageSink`] and [`CaptureTarget`]; [`MockDevice`] and
//! [`MockTarget`] are in-memory implementations for tests and demos.

mod backend;
mod image;
mod mock;
mod selection;
mod types;

pub use backend::{CaptureTarget, DeviceError, DeviceFault, DeviceSession, ImageSink};
pub use image::StillImage;
pub use mock::{Call, FailPoint, MockDevice, MockTarget};
pub use selection::{choose_device_id, choose_preview_size, choose_still_size};
pub use types::{
    DeviceHandle, DeviceId, DeviceMetadata, Facing, ImageFormat, SessionHandle, SinkHandle, Size,
    StreamConfigurationMap, SurfaceId,
};
