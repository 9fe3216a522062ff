//! Collaborator traits the controller drives.
//!
//! These are the only seams between the state machine and real hardware.
//! Asynchronous operations return `Ok(())` once the request was accepted and
//! complete later through exactly one [`Responder::deliver`] call.

use super::{DeviceHandle, DeviceId, DeviceMetadata, Facing, ImageFormat, SessionHandle, SinkHandle, Size, StillImage, SurfaceId};
use crate::capture::CaptureRequest;
use crate::dispatch::Responder;
use thiserror::Error;

/// Errors raised synchronously by device calls.
///
/// Any of these inside a transition hook takes the controller down the fatal
/// shutdown path.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    /// The backend refused or failed the call.
    #[error("device access failed: {0}")]
    Access(String),
    /// No device with this id.
    #[error("camera device not found: {0}")]
    NotFound(DeviceId),
    /// No device faces the requested way.
    #[error("no camera facing {0:?}")]
    NoMatchingDevice(Facing),
    /// The chosen device offers no sizes for a needed format.
    #[error("device reports no output sizes for {0:?}")]
    NoOutputSizes(ImageFormat),
    /// A handle the backend does not know, or a missing one.
    #[error("unknown or released handle")]
    InvalidHandle,
    /// The device is gone.
    #[error("device disconnected")]
    Disconnected,
}

/// Fault codes a device may report after opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    /// Another client holds the device.
    InUse,
    /// Too many devices are open system-wide.
    MaxInUse,
    /// Device policy forbids access.
    Disabled,
    /// The device itself failed.
    Device,
    /// The camera service failed.
    Service,
}

impl DeviceFault {
    /// Maps a platform error code, `None` for codes outside the known set.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(DeviceFault::InUse),
            2 => Some(DeviceFault::MaxInUse),
            3 => Some(DeviceFault::Disabled),
            4 => Some(DeviceFault::Device),
            5 => Some(DeviceFault::Service),
            _ => None,
        }
    }
}

/// Device enumeration, lifecycle and capture submission.
pub trait DeviceSession {
    /// Lists all device ids in enumeration order.
    fn list_devices(&self) -> Result<Vec<DeviceId>, DeviceError>;

    /// Reads static metadata for one device.
    fn capabilities(&self, id: &DeviceId) -> Result<DeviceMetadata, DeviceError>;

    /// Starts opening `id`. Completes with `DeviceOpened`, `DeviceDisconnected`
    /// or `DeviceFault`.
    fn open_device(&mut self, id: &DeviceId, responder: Responder) -> Result<(), DeviceError>;

    /// Closes an opened device.
    fn close_device(&mut self, device: DeviceHandle) -> Result<(), DeviceError>;

    /// Starts configuring a session over `outputs`. Completes with
    /// `SessionConfigured` or `SessionConfigureFailed`.
    fn create_session(
        &mut self,
        device: DeviceHandle,
        outputs: &[SurfaceId],
        responder: Responder,
    ) -> Result<(), DeviceError>;

    /// Closes a configured session, dropping its pending requests.
    fn close_session(&mut self, session: SessionHandle) -> Result<(), DeviceError>;

    /// Replaces the repeating request. Every frame produces capture results on
    /// `responder`.
    fn submit_repeating(
        &mut self,
        session: SessionHandle,
        request: &CaptureRequest,
        responder: Responder,
    ) -> Result<(), DeviceError>;

    /// Stops the repeating request.
    fn stop_repeating(&mut self, session: SessionHandle) -> Result<(), DeviceError>;

    /// Submits a single request ahead of any repeating one.
    fn submit_once(
        &mut self,
        session: SessionHandle,
        request: &CaptureRequest,
        responder: Responder,
    ) -> Result<(), DeviceError>;
}

/// Still-image sinks owned by the device layer.
pub trait ImageSink {
    /// Creates a sink holding at most `max_images` images of `size`.
    fn create_image_sink(
        &mut self,
        size: Size,
        format: ImageFormat,
        max_images: u32,
    ) -> Result<SinkHandle, DeviceError>;

    /// The surface a capture request targets to write into `sink`.
    fn sink_surface(&self, sink: SinkHandle) -> Result<SurfaceId, DeviceError>;

    /// Installs or clears the image-ready listener. Each ready image produces
    /// one `ImageAvailable` event.
    fn set_image_listener(
        &mut self,
        sink: SinkHandle,
        listener: Option<Responder>,
    ) -> Result<(), DeviceError>;

    /// Takes the newest image, dropping any older ones.
    fn acquire_latest_image(&mut self, sink: SinkHandle) -> Result<Option<StillImage>, DeviceError>;

    /// Frees the sink and any images it still holds.
    fn release_image_sink(&mut self, sink: SinkHandle) -> Result<(), DeviceError>;
}

/// The display surface the preview streams into.
pub trait CaptureTarget {
    /// Whether the surface exists yet.
    fn is_available(&self) -> bool;

    /// Requests a single `SurfaceAvailable` event once the surface exists.
    fn register_available_listener(&mut self, responder: Responder);

    /// The surface the preview request targets.
    fn surface(&self) -> SurfaceId;

    /// Binds the surface's buffer dimensions.
    fn set_buffer_size(&mut self, size: Size) -> Result<(), DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_codes() {
        assert_eq!(DeviceFault::from_code(1), Some(DeviceFault::InUse));
        assert_eq!(DeviceFault::from_code(5), Some(DeviceFault::Service));
        assert_eq!(DeviceFault::from_code(0), None);
    }
}
