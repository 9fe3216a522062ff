//! Mutable session context owned by the controller.

use super::Effect;
use crate::capture::CaptureRequest;
use crate::device::{DeviceHandle, DeviceId, SessionHandle, SinkHandle, Size, SurfaceId};

/// Outcome of device and size selection on entering OpenDevice.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Device picked by lens facing.
    pub device_id: DeviceId,
    /// Widest still size the sensor offers.
    pub still_size: Size,
    /// Dimensions the image sink was created with.
    pub sink_size: Size,
    /// Preview stream size, nearest in aspect to the still.
    pub preview_size: Size,
}

/// Everything a running capture session holds.
///
/// Handles appear in protocol order (sink, device, capture session) and
/// are only ever cleared together.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) device: Option<DeviceHandle>,
    pub(crate) capture_session: Option<SessionHandle>,
    pub(crate) image_sink: Option<SinkHandle>,
    pub(crate) sink_surface: Option<SurfaceId>,
    pub(crate) preview_surface: Option<SurfaceId>,
    /// Repeating request reused by Preview, AutoFocus and AutoExposure.
    pub(crate) template: Option<CaptureRequest>,
    pub(crate) selection: Option<Selection>,
}

impl Session {
    /// Opened device, once the open completed.
    pub fn device(&self) -> Option<DeviceHandle> {
        self.device
    }

    /// Configured capture session.
    pub fn capture_session(&self) -> Option<SessionHandle> {
        self.capture_session
    }

    /// Still-image sink.
    pub fn image_sink(&self) -> Option<SinkHandle> {
        self.image_sink
    }

    /// Repeating request template, built in CreateSession.
    pub fn template(&self) -> Option<&CaptureRequest> {
        self.template.as_ref()
    }

    /// Device and size choice made in OpenDevice.
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// True when no hardware handle is held.
    pub fn is_released(&self) -> bool {
        self.device.is_none() && self.capture_session.is_none() && self.image_sink.is_none()
    }

    /// Clears the session and returns the release calls for what it held:
    /// image sink, then capture session, then device.
    pub(crate) fn take_release_effects(&mut self) -> Vec<Effect> {
        let mut effects = Vec::with_capacity(3);
        if let Some(sink) = self.image_sink.take() {
            effects.push(Effect::ReleaseImageSink(sink));
        }
        if let Some(session) = self.capture_session.take() {
            effects.push(Effect::CloseSession(session));
        }
        if let Some(device) = self.device.take() {
            effects.push(Effect::CloseDevice(device));
        }
        *self = Session::default();
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_order_and_clear() {
        let mut session = Session {
            device: Some(DeviceHandle(1)),
            capture_session: Some(SessionHandle(2)),
            image_sink: Some(SinkHandle(3)),
            ..Default::default()
        };

        let effects = session.take_release_effects();
        assert_eq!(
            effects,
            vec![
                Effect::ReleaseImageSink(SinkHandle(3)),
                Effect::CloseSession(SessionHandle(2)),
                Effect::CloseDevice(DeviceHandle(1)),
            ]
        );
        assert!(session.is_released());
    }

    #[test]
    fn test_release_skips_missing_handles() {
        let mut session = Session {
            image_sink: Some(SinkHandle(3)),
            ..Default::default()
        };

        assert_eq!(
            session.take_release_effects(),
            vec![Effect::ReleaseImageSink(SinkHandle(3))]
        );
        assert!(Session::default().take_release_effects().is_empty());
    }
}
