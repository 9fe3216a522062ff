//! Capture requests and their control settings.

use crate::device::SurfaceId;

/// Device-side defaults a request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    /// Tuned for a continuous viewfinder stream.
    Preview,
    /// Tuned for a single high-quality frame.
    StillCapture,
}

/// Autofocus mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    /// Manual focus.
    Off,
    /// Single sweep on trigger.
    Auto,
    /// Smooth continuous focus for recording.
    ContinuousVideo,
    /// Aggressive continuous focus for stills.
    ContinuousPicture,
}

/// Auto-exposure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeMode {
    /// Manual exposure.
    Off,
    /// Automatic exposure, flash off.
    On,
    /// Automatic exposure, flash when the scene needs it.
    OnAutoFlash,
    /// Automatic exposure, flash on every still.
    OnAlwaysFlash,
}

/// One-time autofocus trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfTrigger {
    /// No trigger this frame.
    Idle,
    /// Start an autofocus scan.
    Start,
    /// Cancel a running scan and unlock.
    Cancel,
}

/// One-time auto-exposure precapture trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecaptureTrigger {
    /// No trigger this frame.
    Idle,
    /// Start the precapture metering sequence.
    Start,
    /// Abort a running precapture sequence.
    Cancel,
}

/// A capture request: output targets plus the controls to apply.
///
/// Unset controls are left to the template's defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    template: RequestTemplate,
    targets: Vec<SurfaceId>,
    af_mode: Option<AfMode>,
    ae_mode: Option<AeMode>,
    af_trigger: Option<AfTrigger>,
    precapture_trigger: Option<PrecaptureTrigger>,
    /// Clockwise rotation of the encoded still, in degrees.
    jpeg_orientation: Option<u16>,
}

impl CaptureRequest {
    /// An empty request over `template` with no targets and no controls set.
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            template,
            targets: Vec::new(),
            af_mode: None,
            ae_mode: None,
            af_trigger: None,
            precapture_trigger: None,
            jpeg_orientation: None,
        }
    }

    /// Adds an output surface; duplicates are ignored.
    pub fn add_target(&mut self, surface: SurfaceId) -> &mut Self {
        if !self.targets.contains(&surface) {
            self.targets.push(surface);
        }
        self
    }

    /// Sets the autofocus mode.
    pub fn set_af_mode(&mut self, mode: AfMode) -> &mut Self {
        self.af_mode = Some(mode);
        self
    }

    /// Sets the auto-exposure mode.
    pub fn set_ae_mode(&mut self, mode: AeMode) -> &mut Self {
        self.ae_mode = Some(mode);
        self
    }

    /// Sets the one-shot autofocus trigger.
    pub fn set_af_trigger(&mut self, trigger: AfTrigger) -> &mut Self {
        self.af_trigger = Some(trigger);
        self
    }

    /// Sets the one-shot precapture trigger.
    pub fn set_precapture_trigger(&mut self, trigger: PrecaptureTrigger) -> &mut Self {
        self.precapture_trigger = Some(trigger);
        self
    }

    /// Sets the clockwise rotation written into encoded stills.
    pub fn set_jpeg_orientation(&mut self, degrees: u16) -> &mut Self {
        self.jpeg_orientation = Some(degrees);
        self
    }

    /// Template the request was built from.
    pub fn template(&self) -> RequestTemplate {
        self.template
    }

    /// Output surfaces, in insertion order.
    pub fn targets(&self) -> &[SurfaceId] {
        &self.targets
    }

    /// Autofocus mode, if set.
    pub fn af_mode(&self) -> Option<AfMode> {
        self.af_mode
    }

    /// Auto-exposure mode, if set.
    pub fn ae_mode(&self) -> Option<AeMode> {
        self.ae_mode
    }

    /// Autofocus trigger, if set.
    pub fn af_trigger(&self) -> Option<AfTrigger> {
        self.af_trigger
    }

    /// Precapture trigger, if set.
    pub fn precapture_trigger(&self) -> Option<PrecaptureTrigger> {
        self.precapture_trigger
    }

    /// Still rotation in degrees, if set.
    pub fn jpeg_orientation(&self) -> Option<u16> {
        self.jpeg_orientation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_targets_deduplicated() {
        let mut request = CaptureRequest::new(RequestTemplate::Preview);
        request.add_target(SurfaceId(1)).add_target(SurfaceId(1)).add_target(SurfaceId(2));

        assert_eq!(request.targets(), &[SurfaceId(1), SurfaceId(2)]);
    }

    #[test]
    fn test_controls_start_unset() {
        let mut request = CaptureRequest::new(RequestTemplate::StillCapture);
        assert_eq!(request.af_mode(), None);
        assert_eq!(request.jpeg_orientation(), None);

        request.set_af_mode(AfMode::ContinuousPicture).set_jpeg_orientation(90);
        assert_eq!(request.af_mode(), Some(AfMode::ContinuousPicture));
        assert_eq!(request.jpeg_orientation(), Some(90));
    }
}
