//! In-memory device and capture target.
//!
//! [`MockDevice`] records every call it receives and holds on to the
//! responders of pending async operations, so a test decides exactly when
//! and how each completes. In simulator mode it completes opens and session
//! creation on its own and [`MockDevice::tick`] streams frames whose AF/AE
//! states converge after a seeded number of frames.

use super::{
    CaptureTarget, DeviceError, DeviceFault, DeviceHandle, DeviceId, DeviceMetadata, DeviceSession,
    Facing, ImageFormat, ImageSink, SessionHandle, SinkHandle, Size, StillImage,
    StreamConfigurationMap, SurfaceId,
};
use crate::capture::{
    AeState, AfState, AfTrigger, CaptureRequest, CaptureResult, PrecaptureTrigger,
};
use crate::config::SimulatorConfig;
use crate::dispatch::{Event, Responder};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::{HashMap, HashSet, VecDeque};

/// A call the mock received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `open_device` for this id.
    OpenDevice(DeviceId),
    /// `close_device`.
    CloseDevice(DeviceHandle),
    /// `create_session`.
    CreateSession {
        /// Device the session was requested on.
        device: DeviceHandle,
        /// Output surfaces, preview first.
        outputs: Vec<SurfaceId>,
    },
    /// `close_session`.
    CloseSession(SessionHandle),
    /// `submit_repeating` with this request.
    SubmitRepeating(CaptureRequest),
    /// `stop_repeating`.
    StopRepeating,
    /// `submit_once` with this request.
    SubmitOnce(CaptureRequest),
    /// `create_image_sink`.
    CreateImageSink {
        /// Requested image size.
        size: Size,
        /// Requested image format.
        format: ImageFormat,
        /// Requested buffer depth.
        max_images: u32,
    },
    /// `set_image_listener`, armed or cleared.
    SetImageListener {
        /// Sink the listener belongs to.
        sink: SinkHandle,
        /// True when a listener was installed.
        armed: bool,
    },
    /// `acquire_image`.
    AcquireImage(SinkHandle),
    /// `release_image_sink`.
    ReleaseImageSink(SinkHandle),
}

/// Operations that can be told to fail synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    /// `list_devices`.
    ListDevices,
    /// `open_device`.
    OpenDevice,
    /// `create_session`.
    CreateSession,
    /// `submit_repeating`.
    SubmitRepeating,
    /// `stop_repeating`.
    StopRepeating,
    /// `submit_once`.
    SubmitOnce,
    /// `create_image_sink`.
    CreateImageSink,
    /// `set_image_listener`.
    SetImageListener,
    /// `acquire_image`.
    AcquireImage,
    /// `release_image_sink`.
    ReleaseImageSink,
    /// `close_session`.
    CloseSession,
    /// `close_device`.
    CloseDevice,
}

#[derive(Debug)]
struct MockSink {
    surface: SurfaceId,
    size: Size,
    format: ImageFormat,
    max_images: usize,
    listener: Option<Responder>,
    images: VecDeque<StillImage>,
}

/// Convergence progress for simulator frames.
#[derive(Debug)]
struct Simulation {
    config: SimulatorConfig,
    rng: ChaCha8Rng,
    focus_frames_left: Option<u32>,
    expose_frames_left: Option<u32>,
}

impl Simulation {
    fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            focus_frames_left: None,
            expose_frames_left: None,
        }
    }

    fn draw(&mut self, max: u32) -> u32 {
        1 + self.rng.next_u32() % max.max(1)
    }

    /// AF/AE states for the next frame of `request`.
    fn frame_states(&mut self, request: &CaptureRequest) -> (AfState, AeState) {
        let af = match request.af_trigger() {
            Some(AfTrigger::Start) => {
                let max = self.config.max_frames_to_focus;
                let left = match self.focus_frames_left {
                    Some(left) => left,
                    None => self.draw(max),
                };
                if left <= 1 {
                    self.focus_frames_left = Some(0);
                    AfState::FocusedLocked
                } else {
                    self.focus_frames_left = Some(left - 1);
                    AfState::ActiveScan
                }
            }
            _ => {
                self.focus_frames_left = None;
                AfState::PassiveFocused
            }
        };

        let ae = match request.precapture_trigger() {
            Some(PrecaptureTrigger::Start) => {
                let max = self.config.max_frames_to_expose;
                let left = match self.expose_frames_left {
                    Some(left) => left,
                    None => self.draw(max),
                };
                if left <= 1 {
                    self.expose_frames_left = Some(0);
                    if self.config.flash_required {
                        AeState::FlashRequired
                    } else {
                        AeState::Converged
                    }
                } else {
                    self.expose_frames_left = Some(left - 1);
                    AeState::Precapture
                }
            }
            _ => {
                self.expose_frames_left = None;
                AeState::Searching
            }
        };

        (af, ae)
    }
}

/// Recording, manually driven implementation of [`DeviceSession`] and [`ImageSink`].
#[derive(Debug)]
pub struct MockDevice {
    devices: Vec<(DeviceId, DeviceMetadata)>,
    calls: Vec<Call>,
    failures: HashSet<FailPoint>,
    next_id: u64,
    frame_number: u64,

    pending_open: Option<(DeviceId, Responder)>,
    open_devices: HashMap<DeviceHandle, Responder>,
    pending_session: Option<Responder>,
    sessions: HashSet<SessionHandle>,
    repeating: Option<(CaptureRequest, Responder)>,
    one_shots: VecDeque<(CaptureRequest, Responder)>,
    sinks: HashMap<SinkHandle, MockSink>,

    simulation: Option<Simulation>,
}

impl MockDevice {
    /// A back camera ("0") and a front camera ("1") with typical phone sizes.
    pub fn new() -> Self {
        Self::with_devices(vec![
            (DeviceId::new("0"), Self::default_metadata(Facing::Back)),
            (DeviceId::new("1"), Self::default_metadata(Facing::Front)),
        ])
    }

    /// A mock exposing exactly `devices`.
    pub fn with_devices(devices: Vec<(DeviceId, DeviceMetadata)>) -> Self {
        Self {
            devices,
            calls: Vec::new(),
            failures: HashSet::new(),
            next_id: 1,
            frame_number: 0,
            pending_open: None,
            open_devices: HashMap::new(),
            pending_session: None,
            sessions: HashSet::new(),
            repeating: None,
            one_shots: VecDeque::new(),
            sinks: HashMap::new(),
            simulation: None,
        }
    }

    /// A mock that completes async work by itself and converges per `config`.
    pub fn simulated(config: SimulatorConfig) -> Self {
        let mut device = Self::new();
        device.simulation = Some(Simulation::new(config));
        device
    }

    /// JPEG and preview sizes of a typical phone camera.
    pub fn default_metadata(facing: Facing) -> DeviceMetadata {
        DeviceMetadata {
            facing,
            stream_map: StreamConfigurationMap::new()
                .with_outputs(
                    ImageFormat::Jpeg,
                    [
                        Size::new(1920, 1080),
                        Size::new(4032, 3024),
                        Size::new(1280, 720),
                        Size::new(640, 480),
                    ],
                )
                .with_outputs(
                    ImageFormat::Private,
                    [
                        Size::new(1920, 1080),
                        Size::new(1440, 1080),
                        Size::new(1280, 960),
                        Size::new(640, 480),
                    ],
                ),
        }
    }

    /// Makes the given operation fail until [`MockDevice::heal`] is called.
    pub fn fail_on(&mut self, point: FailPoint) {
        self.failures.insert(point);
    }

    /// Lets `point` succeed again.
    pub fn heal(&mut self, point: FailPoint) {
        self.failures.remove(&point);
    }

    /// Every call received so far.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Devices currently open.
    pub fn open_device_count(&self) -> usize {
        self.open_devices.len()
    }

    /// Sessions currently configured.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Image sinks currently alive.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// True when the mock holds no device, session or sink.
    pub fn is_idle(&self) -> bool {
        self.open_devices.is_empty() && self.sessions.is_empty() && self.sinks.is_empty()
    }

    /// True while an open waits for completion.
    pub fn has_pending_open(&self) -> bool {
        self.pending_open.is_some()
    }

    /// True while a session waits for configuration.
    pub fn has_pending_session(&self) -> bool {
        self.pending_session.is_some()
    }

    /// The current repeating request, if any.
    pub fn repeating_request(&self) -> Option<&CaptureRequest> {
        self.repeating.as_ref().map(|(request, _)| request)
    }

    /// One-shot requests not yet completed.
    pub fn pending_captures(&self) -> usize {
        self.one_shots.len()
    }

    /// Completes the pending open successfully.
    pub fn complete_open(&mut self) -> Option<DeviceHandle> {
        let (id, responder) = self.pending_open.take()?;
        let handle = DeviceHandle(self.allocate());
        tracing::debug!(device_id = %id, ?handle, "Mock device opened");
        responder.deliver(Event::DeviceOpened(handle));
        self.open_devices.insert(handle, responder);
        Some(handle)
    }

    /// Fails the pending open with `fault`.
    pub fn fail_open(&mut self, fault: DeviceFault) -> bool {
        match self.pending_open.take() {
            Some((_, responder)) => {
                responder.deliver(Event::DeviceFault(fault));
                true
            }
            None => false,
        }
    }

    /// Reports every open device as disconnected.
    pub fn disconnect(&mut self) {
        for responder in self.open_devices.values() {
            responder.deliver(Event::DeviceDisconnected);
        }
    }

    /// Completes the pending session creation successfully.
    pub fn configure_session(&mut self) -> Option<SessionHandle> {
        let responder = self.pending_session.take()?;
        let handle = SessionHandle(self.allocate());
        self.sessions.insert(handle);
        responder.deliver(Event::SessionConfigured(handle));
        Some(handle)
    }

    /// Fails the pending session creation.
    pub fn fail_configure(&mut self) -> bool {
        match self.pending_session.take() {
            Some(responder) => {
                responder.deliver(Event::SessionConfigureFailed);
                true
            }
            None => false,
        }
    }

    /// Delivers `result` for the repeating request. False if nothing repeats.
    pub fn emit_result(&mut self, result: CaptureResult) -> bool {
        match &self.repeating {
            Some((_, responder)) => {
                responder.deliver(Event::CaptureResult(result));
                true
            }
            None => false,
        }
    }

    /// Finishes the oldest one-shot request: a final result, then the image
    /// in every sink it targets.
    pub fn complete_capture(&mut self) -> bool {
        let Some((request, responder)) = self.one_shots.pop_front() else {
            return false;
        };
        self.frame_number += 1;
        let frame = self.frame_number;
        responder.deliver(Event::CaptureResult(CaptureResult::final_result(frame)));

        for (handle, sink) in self.sinks.iter_mut() {
            if !request.targets().contains(&sink.surface) {
                continue;
            }
            let image = StillImage::new(encode_placeholder(frame, sink.size), sink.size, sink.format);
            if sink.images.len() >= sink.max_images {
                sink.images.pop_front();
            }
            sink.images.push_back(image);
            if let Some(listener) = &sink.listener {
                listener.deliver(Event::ImageAvailable(*handle));
            }
        }
        true
    }

    /// Simulator: produces one frame. A pending one-shot completes first;
    /// otherwise the repeating request yields a final result with AF/AE states.
    pub fn tick(&mut self) -> bool {
        if self.complete_capture() {
            return true;
        }
        let Some((request, responder)) = &self.repeating else {
            return false;
        };
        let states = match self.simulation.as_mut() {
            Some(simulation) => Some(simulation.frame_states(request)),
            None => None,
        };
        self.frame_number += 1;
        let mut result = CaptureResult::final_result(self.frame_number);
        if let Some((af, ae)) = states {
            result = result.with_af_state(af).with_ae_state(ae);
        }
        responder.deliver(Event::CaptureResult(result));
        true
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check(&self, point: FailPoint) -> Result<(), DeviceError> {
        if self.failures.contains(&point) {
            Err(DeviceError::Access(format!("injected failure at {:?}", point)))
        } else {
            Ok(())
        }
    }

    fn auto(&self) -> bool {
        self.simulation.is_some()
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal JPEG-framed payload: SOI, frame number, size, EOI.
fn encode_placeholder(frame: u64, size: Size) -> Vec<u8> {
    let mut data = vec![0xFF, 0xD8];
    data.extend_from_slice(&frame.to_be_bytes());
    data.extend_from_slice(&size.width.to_be_bytes());
    data.extend_from_slice(&size.height.to_be_bytes());
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

impl DeviceSession for MockDevice {
    fn list_devices(&self) -> Result<Vec<DeviceId>, DeviceError> {
        self.check(FailPoint::ListDevices)?;
        Ok(self.devices.iter().map(|(id, _)| id.clone()).collect())
    }

    fn capabilities(&self, id: &DeviceId) -> Result<DeviceMetadata, DeviceError> {
        self.devices
            .iter()
            .find(|(known, _)| known == id)
            .map(|(_, meta)| meta.clone())
            .ok_or_else(|| DeviceError::NotFound(id.clone()))
    }

    fn open_device(&mut self, id: &DeviceId, responder: Responder) -> Result<(), DeviceError> {
        self.calls.push(Call::OpenDevice(id.clone()));
        self.check(FailPoint::OpenDevice)?;
        if !self.devices.iter().any(|(known, _)| known == id) {
            return Err(DeviceError::NotFound(id.clone()));
        }
        self.pending_open = Some((id.clone(), responder));
        if self.auto() {
            self.complete_open();
        }
        Ok(())
    }

    fn close_device(&mut self, device: DeviceHandle) -> Result<(), DeviceError> {
        self.calls.push(Call::CloseDevice(device));
        self.check(FailPoint::CloseDevice)?;
        self.open_devices
            .remove(&device)
            .map(|_| ())
            .ok_or(DeviceError::InvalidHandle)
    }

    fn create_session(
        &mut self,
        device: DeviceHandle,
        outputs: &[SurfaceId],
        responder: Responder,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::CreateSession {
            device,
            outputs: outputs.to_vec(),
        });
        self.check(FailPoint::CreateSession)?;
        if !self.open_devices.contains_key(&device) {
            return Err(DeviceError::InvalidHandle);
        }
        self.pending_session = Some(responder);
        if self.auto() {
            self.configure_session();
        }
        Ok(())
    }

    fn close_session(&mut self, session: SessionHandle) -> Result<(), DeviceError> {
        self.calls.push(Call::CloseSession(session));
        self.check(FailPoint::CloseSession)?;
        if !self.sessions.remove(&session) {
            return Err(DeviceError::InvalidHandle);
        }
        self.repeating = None;
        self.one_shots.clear();
        Ok(())
    }

    fn submit_repeating(
        &mut self,
        session: SessionHandle,
        request: &CaptureRequest,
        responder: Responder,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::SubmitRepeating(request.clone()));
        self.check(FailPoint::SubmitRepeating)?;
        if !self.sessions.contains(&session) {
            return Err(DeviceError::InvalidHandle);
        }
        self.repeating = Some((request.clone(), responder));
        Ok(())
    }

    fn stop_repeating(&mut self, session: SessionHandle) -> Result<(), DeviceError> {
        self.calls.push(Call::StopRepeating);
        self.check(FailPoint::StopRepeating)?;
        if !self.sessions.contains(&session) {
            return Err(DeviceError::InvalidHandle);
        }
        self.repeating = None;
        Ok(())
    }

    fn submit_once(
        &mut self,
        session: SessionHandle,
        request: &CaptureRequest,
        responder: Responder,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::SubmitOnce(request.clone()));
        self.check(FailPoint::SubmitOnce)?;
        if !self.sessions.contains(&session) {
            return Err(DeviceError::InvalidHandle);
        }
        self.one_shots.push_back((request.clone(), responder));
        Ok(())
    }
}

impl ImageSink for MockDevice {
    fn create_image_sink(
        &mut self,
        size: Size,
        format: ImageFormat,
        max_images: u32,
    ) -> Result<SinkHandle, DeviceError> {
        self.calls.push(Call::CreateImageSink {
            size,
            format,
            max_images,
        });
        self.check(FailPoint::CreateImageSink)?;
        let handle = SinkHandle(self.allocate());
        let surface = SurfaceId(1000 + handle.0);
        self.sinks.insert(
            handle,
            MockSink {
                surface,
                size,
                format,
                max_images: max_images.max(1) as usize,
                listener: None,
                images: VecDeque::new(),
            },
        );
        Ok(handle)
    }

    fn sink_surface(&self, sink: SinkHandle) -> Result<SurfaceId, DeviceError> {
        self.sinks
            .get(&sink)
            .map(|s| s.surface)
            .ok_or(DeviceError::InvalidHandle)
    }

    fn set_image_listener(
        &mut self,
        sink: SinkHandle,
        listener: Option<Responder>,
    ) -> Result<(), DeviceError> {
        self.calls.push(Call::SetImageListener {
            sink,
            armed: listener.is_some(),
        });
        self.check(FailPoint::SetImageListener)?;
        let entry = self.sinks.get_mut(&sink).ok_or(DeviceError::InvalidHandle)?;
        entry.listener = listener;
        Ok(())
    }

    fn acquire_latest_image(&mut self, sink: SinkHandle) -> Result<Option<StillImage>, DeviceError> {
        self.calls.push(Call::AcquireImage(sink));
        self.check(FailPoint::AcquireImage)?;
        let entry = self.sinks.get_mut(&sink).ok_or(DeviceError::InvalidHandle)?;
        let latest = entry.images.pop_back();
        entry.images.clear();
        Ok(latest)
    }

    fn release_image_sink(&mut self, sink: SinkHandle) -> Result<(), DeviceError> {
        self.calls.push(Call::ReleaseImageSink(sink));
        self.check(FailPoint::ReleaseImageSink)?;
        self.sinks
            .remove(&sink)
            .map(|_| ())
            .ok_or(DeviceError::InvalidHandle)
    }
}

/// Capture target whose availability the test controls.
#[derive(Debug)]
pub struct MockTarget {
    surface: SurfaceId,
    available: bool,
    listener: Option<Responder>,
    buffer_size: Option<Size>,
}

impl MockTarget {
    /// A target whose surface already exists.
    pub fn available() -> Self {
        Self {
            surface: SurfaceId(1),
            available: true,
            listener: None,
            buffer_size: None,
        }
    }

    /// A target whose surface has not been created yet.
    pub fn pending() -> Self {
        Self {
            available: false,
            ..Self::available()
        }
    }

    /// Creates the surface and notifies a registered listener.
    pub fn make_available(&mut self, width: u32, height: u32) {
        self.available = true;
        if let Some(listener) = self.listener.take() {
            listener.deliver(Event::SurfaceAvailable { width, height });
        }
    }

    /// True while the controller waits for the surface.
    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }

    /// Buffer size last set by the controller.
    pub fn buffer_size(&self) -> Option<Size> {
        self.buffer_size
    }
}

impl CaptureTarget for MockTarget {
    fn is_available(&self) -> bool {
        self.available
    }

    fn register_available_listener(&mut self, responder: Responder) {
        self.listener = Some(responder);
    }

    fn surface(&self) -> SurfaceId {
        self.surface
    }

    fn set_buffer_size(&mut self, size: Size) -> Result<(), DeviceError> {
        self.buffer_size = Some(size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::RequestTemplate;
    use crate::dispatch::{Generation, SerialQueue};

    #[test]
    fn test_open_completes_on_demand() {
        let queue = SerialQueue::new();
        let mut device = MockDevice::new();
        device
            .open_device(&DeviceId::new("0"), queue.handle().responder(Generation(1)))
            .unwrap();

        assert!(queue.pop().is_none());
        let handle = device.complete_open().unwrap();
        assert_eq!(queue.pop().unwrap().event, Event::DeviceOpened(handle));
        assert_eq!(device.open_device_count(), 1);

        device.close_device(handle).unwrap();
        assert!(device.is_idle());
    }

    #[test]
    fn test_injected_failure() {
        let queue = SerialQueue::new();
        let mut device = MockDevice::new();
        device.fail_on(FailPoint::OpenDevice);

        let result = device.open_device(&DeviceId::new("0"), queue.handle().responder(Generation(1)));
        assert!(matches!(result, Err(DeviceError::Access(_))));
        assert_eq!(device.calls(), &[Call::OpenDevice(DeviceId::new("0"))]);
    }

    #[test]
    fn test_capture_fills_targeted_sink() {
        let queue = SerialQueue::new();
        let responder = queue.handle().responder(Generation(1));
        let mut device = MockDevice::simulated(SimulatorConfig::default());

        let sink = device.create_image_sink(Size::new(30, 40), ImageFormat::Jpeg, 1).unwrap();
        device.set_image_listener(sink, Some(responder.clone())).unwrap();
        device.open_device(&DeviceId::new("0"), responder.clone()).unwrap();
        let Event::DeviceOpened(handle) = queue.pop().unwrap().event else {
            panic!("expected open completion");
        };
        device.create_session(handle, &[SurfaceId(1)], responder.clone()).unwrap();
        let Event::SessionConfigured(session) = queue.pop().unwrap().event else {
            panic!("expected session");
        };

        let mut still = CaptureRequest::new(RequestTemplate::StillCapture);
        still.add_target(device.sink_surface(sink).unwrap());
        device.submit_once(session, &still, responder).unwrap();
        assert!(device.tick());

        assert!(matches!(queue.pop().unwrap().event, Event::CaptureResult(r) if r.is_final()));
        assert_eq!(queue.pop().unwrap().event, Event::ImageAvailable(sink));
        let image = device.acquire_latest_image(sink).unwrap().unwrap();
        assert_eq!(image.size(), Size::new(30, 40));
        assert_eq!(&image.data()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_simulation_converges() {
        let config = SimulatorConfig {
            max_frames_to_focus: 3,
            ..Default::default()
        };
        let mut simulation = Simulation::new(config);
        let mut request = CaptureRequest::new(RequestTemplate::Preview);
        request.set_af_trigger(AfTrigger::Start);

        let mut frames = 0;
        loop {
            frames += 1;
            let (af, _) = simulation.frame_states(&request);
            if af == AfState::FocusedLocked {
                break;
            }
            assert_eq!(af, AfState::ActiveScan);
            assert!(frames < 3);
        }
        assert!(frames <= 3);
    }

    #[test]
    fn test_target_notifies_once() {
        let queue = SerialQueue::new();
        let mut target = MockTarget::pending();
        target.register_available_listener(queue.handle().responder(Generation(2)));

        target.make_available(640, 480);
        target.make_available(640, 480);

        assert!(target.is_available());
        assert_eq!(
            queue.pop().unwrap().event,
            Event::SurfaceAvailable {
                width: 640,
                height: 480
            }
        );
        assert!(queue.pop().is_none());
    }
}
