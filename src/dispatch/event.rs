//! Events delivered by external collaborators.

use crate::capture::CaptureResult;
use crate::device::{DeviceFault, DeviceHandle, SessionHandle, SinkHandle};
use std::fmt;

/// Open/close lifecycle counter used to discard stale callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(pub u64);

impl Generation {
    /// Returns the generation following this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A completion or notification from the device, image sink or capture target.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The capture target has a surface ready to stream into.
    SurfaceAvailable {
        /// Surface width in pixels.
        width: u32,
        /// Surface height in pixels.
        height: u32,
    },
    /// Async device open succeeded.
    DeviceOpened(DeviceHandle),
    /// The device went away.
    DeviceDisconnected,
    /// The device reported an unrecoverable fault.
    DeviceFault(DeviceFault),
    /// Async session creation succeeded.
    SessionConfigured(SessionHandle),
    /// Async session creation failed.
    SessionConfigureFailed,
    /// Per-frame result for a submitted request, partial or final.
    CaptureResult(CaptureResult),
    /// A still image is waiting in the sink.
    ImageAvailable(SinkHandle),
}

impl Event {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SurfaceAvailable { .. } => "surface-available",
            Event::DeviceOpened(_) => "device-opened",
            Event::DeviceDisconnected => "device-disconnected",
            Event::DeviceFault(_) => "device-fault",
            Event::SessionConfigured(_) => "session-configured",
            Event::SessionConfigureFailed => "session-configure-failed",
            Event::CaptureResult(_) => "capture-result",
            Event::ImageAvailable(_) => "image-available",
        }
    }
}

/// An event together with the generation it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Generation of the responder that posted the event.
    pub generation: Generation,
    /// The event itself.
    pub event: Event,
}
