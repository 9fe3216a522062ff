//! The state machine controller.
//!
//! Owns the current [`State`], the [`Session`] context and the collaborators.
//! Public calls and queued events are the only inputs; both end up in
//! [`Controller::transition`], which runs exit hook, then entry hook, then any
//! follow-up transition, to completion before anything else is looked at.

use super::{Effect, Environment, Session, State};
use crate::config::{ConfigError, ControllerConfig};
use crate::device::{
    CaptureTarget, DeviceError, DeviceId, DeviceMetadata, DeviceSession, ImageSink, SinkHandle,
    StillImage, SurfaceId,
};
use crate::dispatch::{Envelope, Event, Generation, QueueHandle, Responder, SerialQueue};
use thiserror::Error;

/// Caller callback receiving the still image of one `take_picture`.
pub type OnImageReady = Box<dyn FnOnce(StillImage) + Send>;

/// Observer called with `(from, to)` for every transition.
pub type TransitionListener = Box<dyn FnMut(State, State) + Send>;

/// Caller misuse reported by the controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// `open` while a session is running.
    #[error("capture session already started (state {0})")]
    AlreadyStarted(State),
    /// The configuration failed validation.
    #[error("invalid controller configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Running counters, exported through the metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStats {
    /// Successful `open` calls.
    pub opens: u64,
    /// State transitions, follow-ups included.
    pub transitions: u64,
    /// Entries into Abort.
    pub aborts: u64,
    /// Hook failures that forced a shutdown.
    pub fatal_shutdowns: u64,
    /// Events dropped for an older generation.
    pub stale_events: u64,
    /// Images handed to callers.
    pub stills_delivered: u64,
    /// Callbacks dropped before their image arrived.
    pub stills_discarded: u64,
    /// `take_picture` calls refused outside Preview.
    pub pictures_rejected: u64,
}

/// Entry hooks see the collaborators only through this.
struct Collaborators<'a, B, T> {
    backend: &'a B,
    target: Option<&'a T>,
}

impl<B: DeviceSession, T: CaptureTarget> Environment for Collaborators<'_, B, T> {
    fn surface_available(&self) -> bool {
        self.target.map(|t| t.is_available()).unwrap_or(false)
    }

    fn preview_surface(&self) -> Option<SurfaceId> {
        self.target.map(|t| t.surface())
    }

    fn devices(&self) -> Result<Vec<(DeviceId, DeviceMetadata)>, DeviceError> {
        self.backend
            .list_devices()?
            .into_iter()
            .map(|id| {
                let metadata = self.backend.capabilities(&id)?;
                Ok((id, metadata))
            })
            .collect()
    }
}

/// Drives one camera through open, preview, still capture and close.
///
/// The controller is single-threaded: call [`Controller::dispatch_pending`]
/// from the thread that owns it to process completions posted by the
/// backend. Dropping an open controller closes it.
pub struct Controller<B, T>
where
    B: DeviceSession + ImageSink,
    T: CaptureTarget,
{
    backend: B,
    target: Option<T>,
    config: ControllerConfig,
    queue: SerialQueue,
    state: State,
    session: Session,
    generation: Generation,
    /// Callback from `take_picture` until TakePicture arms the sink.
    pending: Option<OnImageReady>,
    /// Callback waiting on the sink's next image.
    armed: Option<(SinkHandle, OnImageReady)>,
    transition_listener: Option<TransitionListener>,
    stats: ControllerStats,
}

impl<B, T> Controller<B, T>
where
    B: DeviceSession + ImageSink,
    T: CaptureTarget,
{
    /// Creates a closed controller with its own dispatch queue.
    pub fn new(backend: B, config: ControllerConfig) -> Result<Self, ControllerError> {
        Self::with_queue(backend, config, SerialQueue::new())
    }

    /// Creates a closed controller that drains `queue`.
    pub fn with_queue(
        backend: B,
        config: ControllerConfig,
        queue: SerialQueue,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self {
            backend,
            target: None,
            config,
            queue,
            state: State::Closed,
            session: Session::default(),
            generation: Generation::default(),
            pending: None,
            armed: None,
            transition_listener: None,
            stats: ControllerStats::default(),
        })
    }

    /// Starts a new session on `target`.
    pub fn open(&mut self, target: T) -> Result<(), ControllerError> {
        if self.state != State::Closed {
            return Err(ControllerError::AlreadyStarted(self.state));
        }
        self.target = Some(target);
        self.generation = self.generation.next();
        self.session = Session::default();
        self.stats.opens += 1;
        tracing::info!(generation = %self.generation, "Opening capture session");
        self.transition(State::InitSurface);
        Ok(())
    }

    /// Starts a still capture. Returns `false` unless the preview is running.
    pub fn take_picture<F>(&mut self, on_image_ready: F) -> bool
    where
        F: FnOnce(StillImage) + Send + 'static,
    {
        if self.state != State::Preview {
            self.stats.pictures_rejected += 1;
            tracing::debug!(state = %self.state, "take_picture outside preview, ignored");
            return false;
        }
        self.pending = Some(Box::new(on_image_ready));
        self.transition(State::AutoFocus);
        true
    }

    /// Shuts the session down from whatever state it is in.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        tracing::info!(state = %self.state, generation = %self.generation, "Closing capture session");
        self.transition(State::Abort);
    }

    /// Processes every queued event in order. Returns how many were handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Some(envelope) = self.queue.pop() {
            self.dispatch(envelope);
            handled += 1;
        }
        handled
    }

    /// Installs an observer for state transitions.
    pub fn set_transition_listener<F>(&mut self, listener: F)
    where
        F: FnMut(State, State) + Send + 'static,
    {
        self.transition_listener = Some(Box::new(listener));
    }

    /// Current state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Generation of the current (or last) session.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Handles and choices of the current session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Running counters.
    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    /// Validated configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// The device backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. to drive a mock.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Capture target from the last `open`.
    pub fn target(&self) -> Option<&T> {
        self.target.as_ref()
    }

    /// Mutable access to the capture target.
    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }

    /// Producer handle for posting events from outside the backend.
    pub fn queue_handle(&self) -> QueueHandle {
        self.queue.handle()
    }

    /// True while a `take_picture` callback is still owed an image.
    pub fn has_pending_capture(&self) -> bool {
        self.pending.is_some() || self.armed.is_some()
    }

    fn dispatch(&mut self, envelope: Envelope) {
        let Envelope { generation, event } = envelope;
        if generation != self.generation {
            self.stats.stale_events += 1;
            tracing::debug!(
                event = event.kind(),
                generation = %generation,
                current = %self.generation,
                "Dropping stale event"
            );
            self.release_unclaimed(&event);
            return;
        }

        if let Event::ImageAvailable(sink) = event {
            self.deliver_image(sink);
            return;
        }

        if matches!(
            event,
            Event::DeviceDisconnected | Event::DeviceFault(_) | Event::SessionConfigureFailed
        ) {
            tracing::warn!(state = %self.state, event = ?event, "Device failure reported");
        }

        let next = self.state.on_event(&mut self.session, &event);
        self.release_unclaimed(&event);
        match next {
            Some(next) => self.transition(next),
            None => tracing::trace!(state = %self.state, event = event.kind(), "Event ignored"),
        }
    }

    /// Closes handles that arrived for an open or session nobody waits for.
    fn release_unclaimed(&mut self, event: &Event) {
        match *event {
            Event::DeviceOpened(device) if self.session.device != Some(device) => {
                tracing::warn!(?device, "Closing device from superseded open");
                if let Err(error) = self.backend.close_device(device) {
                    tracing::warn!(?device, %error, "Failed to close superseded device");
                }
            }
            Event::SessionConfigured(session) if self.session.capture_session != Some(session) => {
                tracing::warn!(?session, "Closing superseded capture session");
                if let Err(error) = self.backend.close_session(session) {
                    tracing::warn!(?session, %error, "Failed to close superseded session");
                }
            }
            _ => {}
        }
    }

    fn deliver_image(&mut self, sink: SinkHandle) {
        let callback = match self.armed.take() {
            Some((armed, callback)) if armed == sink => callback,
            other => {
                self.armed = other;
                // Nobody is waiting; free the sink slot.
                if self.session.image_sink == Some(sink) {
                    if let Err(error) = self.backend.acquire_latest_image(sink) {
                        tracing::debug!(%error, "Discarding unclaimed image failed");
                    }
                }
                return;
            }
        };

        match self.backend.acquire_latest_image(sink) {
            Ok(Some(image)) => {
                self.stats.stills_delivered += 1;
                tracing::info!(
                    size = %image.size(),
                    bytes = image.data().len(),
                    "Still image delivered"
                );
                if let Err(error) = self.backend.set_image_listener(sink, None) {
                    tracing::debug!(%error, "Failed to disarm image listener");
                }
                callback(image);
            }
            Ok(None) => {
                tracing::debug!("Image notification without an image");
                self.armed = Some((sink, callback));
            }
            Err(error) => {
                tracing::error!(%error, "Failed to acquire still image");
                if self.state != State::Closed {
                    self.transition(State::Abort);
                }
            }
        }
    }

    /// Moves to `next`, then to any follow-up an entry hook requests.
    fn transition(&mut self, next: State) {
        let mut next = Some(next);
        while let Some(to) = next.take() {
            let from = self.state;
            tracing::debug!(%from, %to, generation = %self.generation, "State transition");
            match self.run_hooks(from, to) {
                Ok(follow_up) => next = follow_up,
                Err(error) => self.fail(to, error),
            }
        }
    }

    fn run_hooks(&mut self, from: State, to: State) -> Result<Option<State>, DeviceError> {
        let effects = from.exit(&mut self.session)?;
        self.apply(effects)?;

        self.state = to;
        self.stats.transitions += 1;
        if to == State::Abort {
            self.stats.aborts += 1;
        }
        if let Some(listener) = self.transition_listener.as_mut() {
            listener(from, to);
        }

        let step = {
            let env = Collaborators {
                backend: &self.backend,
                target: self.target.as_ref(),
            };
            to.enter(&mut self.session, &self.config, &env)?
        };
        self.apply(step.effects)?;
        self.check_handles(to);
        Ok(step.next)
    }

    /// Once `state`'s entry has run, only handles it may hold remain.
    fn check_handles(&self, state: State) {
        debug_assert!(
            state.may_hold_device() || self.session.device.is_none(),
            "device held after entering {}",
            state
        );
        debug_assert!(
            state.may_hold_session() || self.session.capture_session.is_none(),
            "capture session held after entering {}",
            state
        );
    }

    /// The single fatal path: release everything and sit in Closed.
    fn fail(&mut self, during: State, error: DeviceError) {
        tracing::error!(state = %during, %error, "Device access failed, shutting down");
        self.stats.fatal_shutdowns += 1;
        if self.pending.take().is_some() {
            self.discard_still("shutdown");
        }
        for effect in self.session.take_release_effects() {
            self.release(effect);
        }
        if self.armed.take().is_some() {
            self.discard_still("shutdown");
        }

        let from = self.state;
        self.state = State::Closed;
        self.check_handles(State::Closed);
        if from != State::Closed {
            if let Some(listener) = self.transition_listener.as_mut() {
                listener(from, State::Closed);
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), DeviceError> {
        for effect in effects {
            if effect.is_release() {
                self.release(effect);
            } else {
                self.execute(effect)?;
            }
        }
        Ok(())
    }

    fn responder(&self) -> Responder {
        self.queue.handle().responder(self.generation)
    }

    fn target_mut_or_err(&mut self) -> Result<&mut T, DeviceError> {
        self.target
            .as_mut()
            .ok_or_else(|| DeviceError::Access("no capture target attached".into()))
    }

    fn execute(&mut self, effect: Effect) -> Result<(), DeviceError> {
        match effect {
            Effect::WatchSurface => {
                let responder = self.responder();
                self.target_mut_or_err()?.register_available_listener(responder);
            }
            Effect::CreateImageSink {
                size,
                format,
                max_images,
            } => {
                let sink = self.backend.create_image_sink(size, format, max_images)?;
                self.session.image_sink = Some(sink);
                self.session.sink_surface = Some(self.backend.sink_surface(sink)?);
            }
            Effect::OpenDevice(id) => {
                let responder = self.responder();
                self.backend.open_device(&id, responder)?;
                tracing::debug!(device_id = %id, "Device open requested");
            }
            Effect::SetBufferSize(size) => {
                self.target_mut_or_err()?.set_buffer_size(size)?;
            }
            Effect::CreateSession { device, outputs } => {
                let responder = self.responder();
                self.backend.create_session(device, &outputs, responder)?;
            }
            Effect::SubmitRepeating { session, request } => {
                let responder = self.responder();
                self.backend.submit_repeating(session, &request, responder)?;
            }
            Effect::StopRepeating(session) => {
                self.backend.stop_repeating(session)?;
            }
            Effect::SubmitOnce { session, request } => {
                let responder = self.responder();
                self.backend.submit_once(session, &request, responder)?;
            }
            Effect::ArmImageSink(sink) => {
                let Some(callback) = self.pending.take() else {
                    tracing::warn!("Still capture without a pending callback");
                    return Ok(());
                };
                let responder = self.responder();
                self.backend.set_image_listener(sink, Some(responder))?;
                if let Some((previous, _)) = self.armed.replace((sink, callback)) {
                    self.stats.stills_discarded += 1;
                    tracing::warn!(
                        sink = ?previous,
                        "Earlier still never arrived, its callback is dropped"
                    );
                }
            }
            Effect::ClearPendingCapture => {
                if self.pending.take().is_some() {
                    self.discard_still("capture abandoned");
                }
            }
            release => self.release(release),
        }
        Ok(())
    }

    fn discard_still(&mut self, reason: &'static str) {
        self.stats.stills_discarded += 1;
        tracing::debug!(reason, "Still callback dropped before its image arrived");
    }

    /// Best-effort release; failures are logged and swallowed.
    fn release(&mut self, effect: Effect) {
        let result = match effect {
            Effect::ReleaseImageSink(sink) => {
                if self.armed.as_ref().map(|(armed, _)| *armed) == Some(sink) {
                    self.armed = None;
                    self.discard_still("image sink released");
                }
                self.backend.release_image_sink(sink)
            }
            Effect::CloseSession(session) => self.backend.close_session(session),
            Effect::CloseDevice(device) => self.backend.close_device(device),
            other => {
                tracing::warn!(effect = ?other, "Not a release effect");
                return;
            }
        };
        if let Err(error) = result {
            tracing::warn!(%error, "Release failed, continuing shutdown");
        }
    }
}

impl<B, T> Drop for Controller<B, T>
where
    B: DeviceSession + ImageSink,
    T: CaptureTarget,
{
    fn drop(&mut self) {
        self.close();
    }
}
