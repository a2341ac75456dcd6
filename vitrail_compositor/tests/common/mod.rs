// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A scripted platform for driving a [`Compositor`] without a display.

#![allow(
    dead_code,
    unreachable_pub,
    reason = "each test crate uses a different part of the harness"
)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing_subscriber::filter::LevelFilter;
use vitrail_compositor::{Atom, Compositor, CompositorConfig, Platform};
use vitrail_core::damage::{DamageProtocol, DamageReply, FetchToken};
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::presentation::PresentationData;
use vitrail_core::region::{Rect, Region};
use vitrail_core::time::HostTime;
use vitrail_core::trace::{
    PassBeginEvent, PassSummary, PhaseBeginEvent, PhaseEndEvent, PresentFeedbackEvent,
    SwapCompleteEvent, TimerArmedEvent, TraceSink,
};
use vitrail_core::window::{BufferId, Window, WindowId, WindowKind};
use vitrail_debug::recorder::RecorderSink;
use vitrail_render::{
    Backend, BackendError, BackendResult, CompositingType, Frame, GpuBackend, GpuDevice,
    PictureBackend, PictureConnection, RasterBackend, ResourceKey, SafePoint, TextureUpload,
};

/// Everything the fake display saw.
#[derive(Debug, Default)]
pub struct DisplayLog {
    pub swaps: Vec<OutputId>,
    /// Bounding rect of the damage handed to each successful swap.
    pub swap_damage: Vec<Rect>,
    pub uploads: Vec<BufferId>,
    pub safe_points: Vec<SafePoint>,
    pub flushes: Vec<(OutputId, Rect)>,
    pub claims: u32,
    pub releases: u32,
    pub deleted: Vec<Atom>,
    pub selected: Option<CompositingType>,
}

impl DisplayLog {
    pub fn swaps_on(&self, output: OutputId) -> usize {
        self.swaps.iter().filter(|o| **o == output).count()
    }
}

pub type SharedLog = Rc<RefCell<DisplayLog>>;

/// Number of upcoming swaps or composites that fail.
pub type FailureBudget = Rc<Cell<u32>>;

fn take_failure(budget: &FailureBudget) -> bool {
    let left = budget.get();
    if left > 0 {
        budget.set(left - 1);
    }
    left > 0
}

#[derive(Debug)]
pub struct FakeDevice {
    fail_init: bool,
    swap_event: bool,
    fail_swaps: FailureBudget,
    log: SharedLog,
}

impl GpuDevice for FakeDevice {
    fn init(&mut self) -> BackendResult<()> {
        if self.fail_init {
            Err(BackendError::missing_extension("GL_OES_EGL_image"))
        } else {
            Ok(())
        }
    }

    fn supports_buffer_age(&self) -> bool {
        true
    }

    fn has_swap_event(&self) -> bool {
        self.swap_event
    }

    fn create_surface(&mut self, _output: &OutputInfo) -> BackendResult<u8> {
        Ok(2)
    }

    fn destroy_surface(&mut self, _output: OutputId) {}

    fn upload_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
        self.log.borrow_mut().uploads.push(upload.buffer);
        Ok(())
    }

    fn release_texture(&mut self, _key: ResourceKey) {}

    fn draw(&mut self, _output: &OutputInfo, _frame: &Frame) -> BackendResult<()> {
        Ok(())
    }

    fn swap_buffers(
        &mut self,
        output: OutputId,
        damaged: &Region,
    ) -> BackendResult<Option<PresentationData>> {
        if take_failure(&self.fail_swaps) {
            return Err(BackendError::swap("page flip rejected"));
        }
        let mut log = self.log.borrow_mut();
        log.swaps.push(output);
        log.swap_damage.push(damaged.bounding_rect());
        Ok(None)
    }

    fn safe_point(&mut self, point: SafePoint) {
        self.log.borrow_mut().safe_points.push(point);
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    missing_render: bool,
    fail_composites: FailureBudget,
    log: SharedLog,
}

impl PictureConnection for FakeConnection {
    fn query_extensions(&mut self) -> BackendResult<()> {
        if self.missing_render {
            Err(BackendError::missing_extension("RENDER"))
        } else {
            Ok(())
        }
    }

    fn create_buffer(&mut self, _output: &OutputInfo) -> BackendResult<()> {
        Ok(())
    }

    fn destroy_buffer(&mut self, _output: OutputId) {}

    fn update_picture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
        self.log.borrow_mut().uploads.push(upload.buffer);
        Ok(())
    }

    fn free_picture(&mut self, _key: ResourceKey) {}

    fn composite(&mut self, _output: &OutputInfo, _frame: &Frame) -> BackendResult<()> {
        if take_failure(&self.fail_composites) {
            return Err(BackendError::driver_rejected("BadPicture"));
        }
        Ok(())
    }

    fn flush(&mut self, output: OutputId, area: Rect) -> BackendResult<()> {
        self.log.borrow_mut().flushes.push((output, area));
        Ok(())
    }
}

/// Answers every fetch with `reply`, or fails it when `reply` is `None`.
#[derive(Debug, Default)]
pub struct FakeDamage {
    pub next: u64,
    pub reply: Option<DamageReply>,
    pub requests: Vec<WindowId>,
    pub replies_taken: u32,
}

impl DamageProtocol for FakeDamage {
    fn request_fetch(&mut self, window: WindowId) -> FetchToken {
        self.next += 1;
        self.requests.push(window);
        FetchToken(self.next)
    }

    fn take_reply(&mut self, _token: FetchToken) -> Option<DamageReply> {
        self.replies_taken += 1;
        self.reply.clone()
    }
}

#[derive(Debug)]
pub struct FakePlatform {
    pub outputs: Vec<OutputInfo>,
    pub supported: Vec<CompositingType>,
    /// Backend types whose creation fails.
    pub broken: Vec<CompositingType>,
    pub swap_event: bool,
    /// Shared with the GPU device and the picture connection of every
    /// backend this platform creates.
    pub fail_presents: FailureBudget,
    pub requires_compositing: bool,
    pub not_possible: Option<String>,
    pub damage: Option<FakeDamage>,
    pub clock: Rc<Cell<HostTime>>,
    pub log: SharedLog,
}

impl FakePlatform {
    /// One 1920x1080 output at 60 Hz with a GPU.
    pub fn new() -> Self {
        Self::with_outputs(vec![output(1, 0)])
    }

    pub fn with_outputs(outputs: Vec<OutputInfo>) -> Self {
        Self {
            outputs,
            supported: vec![CompositingType::Gpu],
            broken: Vec::new(),
            swap_event: false,
            fail_presents: FailureBudget::default(),
            requires_compositing: false,
            not_possible: None,
            damage: None,
            clock: Rc::new(Cell::new(HostTime(0))),
            log: SharedLog::default(),
        }
    }
}

impl Platform for FakePlatform {
    fn outputs(&self) -> Vec<OutputInfo> {
        self.outputs.clone()
    }

    fn supported_compositors(&self) -> Vec<CompositingType> {
        self.supported.clone()
    }

    fn create_backend(
        &mut self,
        kind: CompositingType,
        guarded_frames: u32,
    ) -> BackendResult<Box<dyn Backend>> {
        let broken = self.broken.contains(&kind);
        let log = self.log.clone();
        let backend: Box<dyn Backend> = match kind {
            CompositingType::Gpu => {
                let device = FakeDevice {
                    fail_init: broken,
                    swap_event: self.swap_event,
                    fail_swaps: self.fail_presents.clone(),
                    log,
                };
                Box::new(GpuBackend::new(device, guarded_frames)?)
            }
            CompositingType::LegacyPicture => {
                let connection = FakeConnection {
                    missing_render: broken,
                    fail_composites: self.fail_presents.clone(),
                    log,
                };
                Box::new(PictureBackend::new(connection)?)
            }
            CompositingType::Raster => {
                if broken {
                    return Err(BackendError::driver_rejected("no shared memory"));
                }
                Box::new(RasterBackend::new())
            }
        };
        Ok(backend)
    }

    fn now(&self) -> HostTime {
        self.clock.get()
    }

    fn compositing_possible(&self) -> bool {
        self.not_possible.is_none()
    }

    fn compositing_not_possible_reason(&self) -> String {
        self.not_possible.clone().unwrap_or_default()
    }

    fn requires_compositing(&self) -> bool {
        self.requires_compositing
    }

    fn set_selected_compositor(&mut self, kind: CompositingType) {
        self.log.borrow_mut().selected = Some(kind);
    }

    fn damage_protocol(&mut self) -> Option<&mut dyn DamageProtocol> {
        self.damage
            .as_mut()
            .map(|damage| damage as &mut dyn DamageProtocol)
    }

    fn claim_selection(&mut self) {
        self.log.borrow_mut().claims += 1;
    }

    fn release_selection(&mut self) {
        self.log.borrow_mut().releases += 1;
    }

    fn delete_support_property(&mut self, atom: Atom) {
        self.log.borrow_mut().deleted.push(atom);
    }
}

/// Forwards to a recorder the test keeps a handle to.
#[derive(Debug, Default, Clone)]
pub struct SharedRecorder(pub Rc<RefCell<RecorderSink>>);

impl TraceSink for SharedRecorder {
    fn on_pass_begin(&mut self, e: &PassBeginEvent) {
        self.0.borrow_mut().on_pass_begin(e);
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        self.0.borrow_mut().on_phase_begin(e);
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        self.0.borrow_mut().on_phase_end(e);
    }

    fn on_timer_armed(&mut self, e: &TimerArmedEvent) {
        self.0.borrow_mut().on_timer_armed(e);
    }

    fn on_swap_complete(&mut self, e: &SwapCompleteEvent) {
        self.0.borrow_mut().on_swap_complete(e);
    }

    fn on_present_feedback(&mut self, e: &PresentFeedbackEvent) {
        self.0.borrow_mut().on_present_feedback(e);
    }

    fn on_pass_summary(&mut self, s: &PassSummary) {
        self.0.borrow_mut().on_pass_summary(s);
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::TRACE)
        .try_init();
}

pub fn ms(millis: u64) -> HostTime {
    HostTime(millis * 1_000_000)
}

/// A 1920x1080 output at 60 Hz whose left edge is at `x`.
pub fn output(id: u32, x: i32) -> OutputInfo {
    OutputInfo::new(OutputId(id), Rect::new(x, 0, 1920, 1080), 60_000)
}

pub fn compositor(platform: FakePlatform) -> Compositor<FakePlatform> {
    compositor_with(platform, CompositorConfig::wayland())
}

pub fn compositor_with(platform: FakePlatform, config: CompositorConfig) -> Compositor<FakePlatform> {
    init_tracing();
    Compositor::new(platform, config)
}

/// Starts compositing at time zero and runs the initial full repaint.
pub fn started(platform: FakePlatform) -> Compositor<FakePlatform> {
    let mut compositor = compositor(platform);
    compositor.start(ms(0)).unwrap();
    compositor.tick(ms(0));
    compositor
}

/// Adds a ready toplevel with a buffer attached.
pub fn map_window(compositor: &mut Compositor<FakePlatform>, geometry: Rect) -> WindowId {
    let space = compositor.space_mut();
    let buffer = BufferId(space.len() as u64 + 1);
    let id = space.add_window(Window::new(WindowKind::Toplevel, geometry).with_buffer(buffer));
    space.set_ready_for_painting(id);
    id
}

pub fn swap_count(compositor: &Compositor<FakePlatform>) -> usize {
    compositor.platform().log.borrow().swaps.len()
}
