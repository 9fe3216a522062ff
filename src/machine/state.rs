//! Protocol states and their entry, event and exit hooks.
//!
//! Hooks are plain functions over the [`Session`] context. Reads they need
//! from the outside world go through [`Environment`]; everything they want done
//! comes back as [`Effect`]s.

use super::{Effect, Selection, Session, Step};
use crate::capture::{
    ae_convergence, af_convergence, AeMode, AfMode, AfTrigger, CaptureRequest, PrecaptureTrigger,
    RequestTemplate,
};
use crate::config::ControllerConfig;
use crate::device::{
    choose_device_id, choose_preview_size, choose_still_size, DeviceError, DeviceId, DeviceMetadata,
    ImageFormat, SurfaceId,
};
use crate::dispatch::Event;
use std::fmt;

/// Read-only view of the collaborators, available to entry hooks.
pub trait Environment {
    /// Whether the capture target's surface exists yet.
    fn surface_available(&self) -> bool;

    /// The capture target's preview surface, if a target is attached.
    fn preview_surface(&self) -> Option<SurfaceId>;

    /// Every device with its metadata, in enumeration order.
    fn devices(&self) -> Result<Vec<(DeviceId, DeviceMetadata)>, DeviceError>;
}

/// One step of the capture protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    /// No session; before `open` and after shutdown.
    #[default]
    Closed,
    /// Waiting for the capture target's surface.
    InitSurface,
    /// Device chosen, sink created, open in flight.
    OpenDevice,
    /// Device open, session configuration in flight.
    CreateSession,
    /// Repeating preview running; the only state accepting `take_picture`.
    Preview,
    /// AF trigger sent, waiting for focus to lock.
    AutoFocus,
    /// Precapture trigger sent, waiting for exposure to settle.
    AutoExposure,
    /// One-shot still in flight.
    TakePicture,
    /// Releasing everything on the way to Closed.
    Abort,
}

impl State {
    /// Every state, in protocol order.
    pub const ALL: [State; 9] = [
        State::Closed,
        State::InitSurface,
        State::OpenDevice,
        State::CreateSession,
        State::Preview,
        State::AutoFocus,
        State::AutoExposure,
        State::TakePicture,
        State::Abort,
    ];

    /// Name for logs and the `/state` endpoint.
    pub fn name(self) -> &'static str {
        match self {
            State::Closed => "Closed",
            State::InitSurface => "InitSurface",
            State::OpenDevice => "OpenDevice",
            State::CreateSession => "CreateSession",
            State::Preview => "Preview",
            State::AutoFocus => "AutoFocus",
            State::AutoExposure => "AutoExposure",
            State::TakePicture => "TakePicture",
            State::Abort => "Abort",
        }
    }

    /// Position in protocol order, for gauges.
    pub fn ordinal(self) -> i64 {
        match self {
            State::Closed => 0,
            State::InitSurface => 1,
            State::OpenDevice => 2,
            State::CreateSession => 3,
            State::Preview => 4,
            State::AutoFocus => 5,
            State::AutoExposure => 6,
            State::TakePicture => 7,
            State::Abort => 8,
        }
    }

    /// States in which the device may be held open.
    pub fn may_hold_device(self) -> bool {
        matches!(
            self,
            State::CreateSession
                | State::Preview
                | State::AutoFocus
                | State::AutoExposure
                | State::TakePicture
        )
    }

    /// States in which a configured capture session may be held.
    pub fn may_hold_session(self) -> bool {
        matches!(
            self,
            State::Preview | State::AutoFocus | State::AutoExposure | State::TakePicture
        )
    }

    /// Runs when the state is installed.
    pub fn enter(
        self,
        session: &mut Session,
        config: &ControllerConfig,
        env: &dyn Environment,
    ) -> Result<Step, DeviceError> {
        match self {
            State::Closed => Ok(Step::stay()),
            State::InitSurface => {
                session.preview_surface = env.preview_surface();
                if env.surface_available() {
                    Ok(Step::stay().then(State::OpenDevice))
                } else {
                    Ok(Step::effects(vec![Effect::WatchSurface]))
                }
            }
            State::OpenDevice => enter_open_device(session, config, env),
            State::CreateSession => enter_create_session(session),
            State::Preview => {
                let capture_session = session.capture_session.ok_or(DeviceError::InvalidHandle)?;
                let template = template_mut(session)?;
                template
                    .set_af_mode(AfMode::ContinuousPicture)
                    .set_ae_mode(AeMode::OnAutoFlash)
                    .set_af_trigger(AfTrigger::Idle)
                    .set_precapture_trigger(PrecaptureTrigger::Idle);
                Ok(Step::effects(vec![Effect::SubmitRepeating {
                    session: capture_session,
                    request: template.clone(),
                }]))
            }
            State::AutoFocus => {
                let capture_session = session.capture_session.ok_or(DeviceError::InvalidHandle)?;
                let template = template_mut(session)?;
                template.set_af_trigger(AfTrigger::Start);
                Ok(Step::effects(vec![Effect::SubmitRepeating {
                    session: capture_session,
                    request: template.clone(),
                }]))
            }
            State::AutoExposure => {
                let capture_session = session.capture_session.ok_or(DeviceError::InvalidHandle)?;
                let template = template_mut(session)?;
                template.set_precapture_trigger(PrecaptureTrigger::Start);
                Ok(Step::effects(vec![Effect::SubmitRepeating {
                    session: capture_session,
                    request: template.clone(),
                }]))
            }
            State::TakePicture => {
                let capture_session = session.capture_session.ok_or(DeviceError::InvalidHandle)?;
                let sink = session.image_sink.ok_or(DeviceError::InvalidHandle)?;
                let sink_surface = session.sink_surface.ok_or(DeviceError::InvalidHandle)?;

                let mut still = CaptureRequest::new(RequestTemplate::StillCapture);
                still
                    .add_target(sink_surface)
                    .set_af_mode(AfMode::ContinuousPicture)
                    .set_ae_mode(AeMode::OnAutoFlash)
                    .set_jpeg_orientation(config.jpeg_orientation);

                Ok(Step::effects(vec![
                    Effect::ArmImageSink(sink),
                    Effect::StopRepeating(capture_session),
                    Effect::SubmitOnce {
                        session: capture_session,
                        request: still,
                    },
                ]))
            }
            State::Abort => {
                let mut effects = vec![Effect::ClearPendingCapture];
                effects.extend(session.take_release_effects());
                Ok(Step::effects(effects).then(State::Closed))
            }
        }
    }

    /// Handles one event; returns the state to move to, if any.
    pub fn on_event(self, session: &mut Session, event: &Event) -> Option<State> {
        match (self, event) {
            (State::Closed, _) | (State::Abort, _) => None,

            (_, Event::DeviceDisconnected) | (_, Event::DeviceFault(_)) => Some(State::Abort),

            (State::InitSurface, Event::SurfaceAvailable { .. }) => Some(State::OpenDevice),

            (State::OpenDevice, Event::DeviceOpened(device)) => {
                session.device = Some(*device);
                Some(State::CreateSession)
            }

            (State::CreateSession, Event::SessionConfigured(capture_session)) => {
                session.capture_session = Some(*capture_session);
                Some(State::Preview)
            }
            (State::CreateSession, Event::SessionConfigureFailed) => Some(State::Abort),

            (State::AutoFocus, Event::CaptureResult(result)) => {
                af_convergence(result).is_ready().then_some(State::AutoExposure)
            }
            (State::AutoExposure, Event::CaptureResult(result)) => {
                ae_convergence(result).is_ready().then_some(State::TakePicture)
            }
            (State::TakePicture, Event::CaptureResult(result)) => {
                result.is_final().then_some(State::Preview)
            }

            _ => None,
        }
    }

    /// Runs when the state is replaced, whatever replaces it.
    pub fn exit(self, session: &mut Session) -> Result<Vec<Effect>, DeviceError> {
        match self {
            State::TakePicture => {
                // Never leave the device triggered or in single-shot mode.
                let capture_session = session.capture_session.ok_or(DeviceError::InvalidHandle)?;
                let template = template_mut(session)?;
                template
                    .set_af_trigger(AfTrigger::Cancel)
                    .set_ae_mode(AeMode::OnAutoFlash);
                Ok(vec![
                    Effect::SubmitRepeating {
                        session: capture_session,
                        request: template.clone(),
                    },
                    Effect::ClearPendingCapture,
                ])
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn template_mut(session: &mut Session) -> Result<&mut CaptureRequest, DeviceError> {
    session.template.as_mut().ok_or(DeviceError::InvalidHandle)
}

fn enter_open_device(
    session: &mut Session,
    config: &ControllerConfig,
    env: &dyn Environment,
) -> Result<Step, DeviceError> {
    let devices = env.devices()?;
    let device_id =
        choose_device_id(&devices, config.facing).ok_or(DeviceError::NoMatchingDevice(config.facing))?;
    let metadata = devices
        .iter()
        .find(|(id, _)| *id == device_id)
        .map(|(_, meta)| meta)
        .ok_or_else(|| DeviceError::NotFound(device_id.clone()))?;

    let still_size = choose_still_size(&metadata.stream_map, config.still_format)
        .ok_or(DeviceError::NoOutputSizes(config.still_format))?;
    let sink_size = if config.portrait {
        still_size.transposed()
    } else {
        still_size
    };
    let preview_size = choose_preview_size(&metadata.stream_map, still_size.aspect())
        .ok_or(DeviceError::NoOutputSizes(ImageFormat::Private))?;

    tracing::debug!(
        device_id = %device_id,
        still = %still_size,
        preview = %preview_size,
        "Selected camera"
    );

    session.selection = Some(Selection {
        device_id: device_id.clone(),
        still_size,
        sink_size,
        preview_size,
    });

    Ok(Step::effects(vec![
        Effect::CreateImageSink {
            size: sink_size,
            format: config.still_format,
            max_images: config.max_images,
        },
        Effect::OpenDevice(device_id),
    ]))
}

fn enter_create_session(session: &mut Session) -> Result<Step, DeviceError> {
    let device = session.device.ok_or(DeviceError::InvalidHandle)?;
    let preview_surface = session.preview_surface.ok_or(DeviceError::InvalidHandle)?;
    let sink_surface = session.sink_surface.ok_or(DeviceError::InvalidHandle)?;
    let preview_size = session
        .selection
        .as_ref()
        .map(|s| s.preview_size)
        .ok_or(DeviceError::InvalidHandle)?;

    let mut template = CaptureRequest::new(RequestTemplate::Preview);
    template.add_target(preview_surface);
    session.template = Some(template);

    Ok(Step::effects(vec![
        Effect::SetBufferSize(preview_size),
        Effect::CreateSession {
            device,
            outputs: vec![preview_surface, sink_surface],
        },
    ]))
}
