//! Side effects requested by state hooks.
//!
//! Hooks never touch a collaborator directly. They describe the device calls
//! they need as [`Effect`]s, which the controller executes in order.

use super::State;
use crate::capture::CaptureRequest;
use crate::device::{DeviceHandle, DeviceId, ImageFormat, SessionHandle, SinkHandle, Size, SurfaceId};

/// One collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the capture target for a `SurfaceAvailable` event.
    WatchSurface,
    /// Create the still-image sink and record its handle and surface.
    CreateImageSink {
        /// Sink dimensions.
        size: Size,
        /// Sink encoding.
        format: ImageFormat,
        /// Images the sink may hold.
        max_images: u32,
    },
    /// Start the async device open.
    OpenDevice(DeviceId),
    /// Bind the preview surface's buffer dimensions.
    SetBufferSize(Size),
    /// Start async session creation over `outputs`.
    CreateSession {
        /// Opened device.
        device: DeviceHandle,
        /// Preview surface and sink surface.
        outputs: Vec<SurfaceId>,
    },
    /// Replace the repeating request.
    SubmitRepeating {
        /// Target session.
        session: SessionHandle,
        /// Request to repeat.
        request: CaptureRequest,
    },
    /// Stop the repeating request.
    StopRepeating(SessionHandle),
    /// Submit a single request.
    SubmitOnce {
        /// Target session.
        session: SessionHandle,
        /// The one-shot request.
        request: CaptureRequest,
    },
    /// Hand the pending still callback to the sink's image listener.
    ArmImageSink(SinkHandle),
    /// Drop the pending still callback if still held.
    ClearPendingCapture,
    /// Free the image sink.
    ReleaseImageSink(SinkHandle),
    /// Close the capture session.
    CloseSession(SessionHandle),
    /// Close the device.
    CloseDevice(DeviceHandle),
}

impl Effect {
    /// Release calls are best-effort: their failures are logged, not raised.
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            Effect::ReleaseImageSink(_) | Effect::CloseSession(_) | Effect::CloseDevice(_)
        )
    }
}

/// Result of an entry hook: effects to run, then an optional follow-up state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Step {
    /// Calls to make, in order.
    pub effects: Vec<Effect>,
    /// State to move to once the effects ran.
    pub next: Option<State>,
}

impl Step {
    /// No effects, no follow-up.
    pub fn stay() -> Self {
        Self::default()
    }

    /// Effects only, no follow-up.
    pub fn effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            next: None,
        }
    }

    /// Requests a follow-up transition once this one completes.
    pub fn then(mut self, next: State) -> Self {
        self.next = Some(next);
        self
    }
}
