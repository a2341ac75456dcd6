// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The compositor: owns the scene and the schedulers and drives passes.
//!
//! ```text
//!            start() ok
//!   Off ───► Starting ───► On
//!    ▲          │ all backends failed
//!    │◄─────────┘
//!    │                      │ stop() / suspend()
//!    └──────── Stopping ◄───┘
//! ```
//!
//! The host loop calls [`Compositor::tick`] whenever
//! [`Compositor::next_deadline`] is reached or the window layer changed the
//! [`Space`]. A tick drains space events into the scene, fires the
//! selection timers and runs every pass whose deadline is due.

use core::fmt;

use tracing::{debug, error, info, trace, warn};
use vitrail_core::output::{OutputId, OutputInfo, max_coverage_output};
use vitrail_core::presentation::{PresentationData, PresentationKinds};
use vitrail_core::region::{Rect, Region};
use vitrail_core::signal::Signal;
use vitrail_core::time::{Duration, HostTime};
use vitrail_core::trace::{
    PassBeginEvent, PassSummaryBuilder, PhaseKind, PresentFeedbackEvent, SwapCompleteEvent,
    TimerArmedEvent, TimerKind, TraceSink, Tracer,
};
use vitrail_core::window::{Space, SpaceEvent, Window, WindowId};
use vitrail_render::effects::EffectChain;
use vitrail_render::{CompositingType, Scene};

use crate::config::{CompositorConfig, SchedulingMode};
use crate::error::CompositorError;
use crate::platform::Platform;
use crate::presentation::Presentation;
use crate::scheduler::{FrameScheduler, FrameState};
use crate::selection::{Atom, DeferredTimer, ReleaseAction, SupportProperties};
use crate::suspend::SuspendReasons;

/// Lifecycle of compositing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompositorState {
    /// No scene and no backend.
    Off,
    /// A backend is being created.
    Starting,
    /// Passes are scheduled and painted.
    On,
    /// The scene and backend are being torn down.
    Stopping,
}

/// Loads effects into a freshly created chain.
///
/// Called every time compositing starts, since stopping unloads every
/// effect.
pub trait EffectLoader {
    /// Registers effects into `chain`.
    fn load(&mut self, chain: &mut EffectChain);
}

impl<F: FnMut(&mut EffectChain)> EffectLoader for F {
    fn load(&mut self, chain: &mut EffectChain) {
        self(chain);
    }
}

/// Repaint state of one scheduling unit: an output, or the whole screen.
#[derive(Debug)]
struct RepaintTarget {
    output: Option<OutputId>,
    scheduler: FrameScheduler,
    repaints: Region,
    frame_requests: Vec<WindowId>,
}

impl RepaintTarget {
    fn new(output: Option<OutputId>, scheduler: FrameScheduler) -> Self {
        Self {
            output,
            scheduler,
            repaints: Region::new(),
            frame_requests: Vec::new(),
        }
    }
}

/// Requests that must not run while space events are being dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Deferred {
    CompositeBlocking(Option<WindowId>),
}

/// What one output contributed to a pass.
#[derive(Debug)]
struct OutputPass {
    output: OutputInfo,
    windows: Vec<WindowId>,
    feedback: Option<PresentationData>,
    swap_pending: bool,
}

/// Top-level compositing state machine.
pub struct Compositor<P> {
    platform: P,
    config: CompositorConfig,
    space: Space,
    state: CompositorState,
    suspended: SuspendReasons,
    scene: Option<Scene>,
    targets: Vec<RepaintTarget>,
    locked: u32,
    not_possible_reason: String,
    selection_owned: bool,
    selection_release: DeferredTimer,
    support: SupportProperties,
    presentation: Presentation,
    deferred: Vec<Deferred>,
    effect_loader: Option<Box<dyn EffectLoader>>,
    trace_sink: Option<Box<dyn TraceSink>>,
    pass_index: u64,
    state_changed: Signal<CompositorState>,
    about_to_toggle_compositing: Signal<()>,
    about_to_destroy: Signal<()>,
    compositing_toggled: Signal<bool>,
}

impl<P> fmt::Debug for Compositor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("state", &self.state)
            .field("suspended", &self.suspended)
            .field("scene", &self.scene)
            .field("targets", &self.targets)
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}

impl<P: Platform> Compositor<P> {
    /// Creates a stopped compositor. Call [`start`](Self::start) to begin
    /// compositing.
    ///
    /// With `use_compositing` off it starts suspended by the user, unless
    /// the platform cannot show windows without compositing.
    pub fn new(platform: P, config: CompositorConfig) -> Self {
        let suspended = if config.use_compositing || platform.requires_compositing() {
            SuspendReasons::empty()
        } else {
            SuspendReasons::USER
        };
        let delay = config.selection_release_delay();
        let presentation = Presentation::new(platform.clock_id());
        Self {
            platform,
            config,
            space: Space::new(),
            state: CompositorState::Off,
            suspended,
            scene: None,
            targets: Vec::new(),
            locked: 0,
            not_possible_reason: String::new(),
            selection_owned: false,
            selection_release: DeferredTimer::new(delay),
            support: SupportProperties::new(delay),
            presentation,
            deferred: Vec::new(),
            effect_loader: None,
            trace_sink: None,
            pass_index: 0,
            state_changed: Signal::new(),
            about_to_toggle_compositing: Signal::new(),
            about_to_destroy: Signal::new(),
            compositing_toggled: Signal::new(),
        }
    }

    // --- accessors ---

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CompositorState {
        self.state
    }

    /// Returns `true` while compositing runs.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == CompositorState::On
    }

    /// Reasons compositing is currently suspended for.
    #[must_use]
    pub fn suspended(&self) -> SuspendReasons {
        self.suspended
    }

    /// Why the last start failed; empty when it did not.
    #[must_use]
    pub fn compositing_not_possible_reason(&self) -> &str {
        &self.not_possible_reason
    }

    /// Active settings.
    #[must_use]
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// The platform.
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// The windows being composited.
    #[must_use]
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// The windows being composited, for the window layer to change.
    /// Changes take effect on the next [`tick`](Self::tick).
    pub fn space_mut(&mut self) -> &mut Space {
        &mut self.space
    }

    /// The scene, while compositing runs.
    #[must_use]
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    /// The scene, mutably.
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scene.as_mut()
    }

    /// Kind of the backend in use.
    #[must_use]
    pub fn compositing_type(&self) -> Option<CompositingType> {
        self.scene.as_ref().map(Scene::compositing_type)
    }

    /// The effect chain, while compositing runs.
    pub fn effects_mut(&mut self) -> Option<&mut EffectChain> {
        self.scene.as_mut().map(Scene::effects_mut)
    }

    /// Frame callbacks and presentation feedback for the protocol layer.
    pub fn presentation_mut(&mut self) -> &mut Presentation {
        &mut self.presentation
    }

    /// Scheduler of `output`, or of the whole screen for `None` in
    /// [`SchedulingMode::Global`].
    #[must_use]
    pub fn scheduler(&self, output: Option<OutputId>) -> Option<&FrameScheduler> {
        self.targets
            .iter()
            .find(|t| t.output == output)
            .map(|t| &t.scheduler)
    }

    /// Installs the loader run every time compositing starts.
    pub fn set_effect_loader(&mut self, loader: impl EffectLoader + 'static) {
        self.effect_loader = Some(Box::new(loader));
    }

    /// Installs a sink for pass instrumentation.
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        self.trace_sink = Some(sink);
    }

    /// Emitted on every lifecycle transition.
    pub fn state_changed(&mut self) -> &mut Signal<CompositorState> {
        &mut self.state_changed
    }

    /// Emitted before compositing starts or stops.
    pub fn about_to_toggle_compositing(&mut self) -> &mut Signal<()> {
        &mut self.about_to_toggle_compositing
    }

    /// Emitted before the scene is destroyed; effects must drop their
    /// window references.
    pub fn about_to_destroy(&mut self) -> &mut Signal<()> {
        &mut self.about_to_destroy
    }

    /// Emitted with `true` once compositing runs and with `false` once it
    /// stopped.
    pub fn compositing_toggled(&mut self) -> &mut Signal<bool> {
        &mut self.compositing_toggled
    }

    // --- lifecycle ---

    /// Starts compositing.
    ///
    /// Backend types are tried in the configured order; the first one that
    /// can be created and set up for every output wins.
    pub fn start(&mut self, now: HostTime) -> Result<(), CompositorError> {
        if !self.suspended.is_empty() {
            debug!(reasons = ?self.suspended.descriptions(), "compositing is suspended");
            return Err(CompositorError::Suspended(self.suspended));
        }
        if !self.platform.compositing_possible() {
            let reason = self.platform.compositing_not_possible_reason();
            error!(%reason, "compositing is not possible");
            self.not_possible_reason.clone_from(&reason);
            return Err(CompositorError::NotPossible(reason));
        }
        if self.state != CompositorState::Off {
            return Err(CompositorError::AlreadyRunning);
        }

        self.about_to_toggle_compositing.emit(&());
        self.set_state(CompositorState::Starting);
        self.platform.claim_selection();
        self.selection_owned = true;
        self.selection_release.stop();

        // Windows closed while compositing was off have nothing to animate.
        let stale = self.space.take_events();
        for event in stale {
            self.react(event, now);
        }

        let outputs = self.platform.outputs();
        let (kind, mut scene) = match self.create_scene(&outputs) {
            Ok(created) => created,
            Err(reasons) => return Err(self.start_failed(reasons)),
        };
        self.platform.set_selected_compositor(kind);
        self.not_possible_reason.clear();

        if let Some(loader) = self.effect_loader.as_mut() {
            loader.load(scene.effects_mut());
        }
        let per_output = self.config.scheduling == SchedulingMode::PerOutput;
        self.space.set_outputs(outputs, per_output);
        let damage_tracked = self.platform.damage_protocol().is_some();
        self.space.setup_compositing(damage_tracked);
        scene.add_existing_windows(&self.space);
        self.scene = Some(scene);
        self.rebuild_targets();

        self.set_state(CompositorState::On);
        info!(%kind, "compositing started");
        self.compositing_toggled.emit(&true);
        self.add_repaint_full(now);
        Ok(())
    }

    fn create_scene(
        &mut self,
        outputs: &[OutputInfo],
    ) -> Result<(CompositingType, Scene), Vec<String>> {
        let order = self
            .config
            .compositing_order(&self.platform.supported_compositors());
        let mut reasons = Vec::new();
        for kind in order {
            debug!(%kind, "creating backend");
            let backend = match self
                .platform
                .create_backend(kind, self.config.frames_to_test_for_safety)
            {
                Ok(backend) => backend,
                Err(err) => {
                    warn!(%kind, %err, "backend creation failed");
                    reasons.push(format!("{kind}: {err}"));
                    continue;
                }
            };
            let mut scene = Scene::new(backend);
            match outputs.iter().try_for_each(|o| scene.add_output(o)) {
                Ok(()) => return Ok((kind, scene)),
                Err(err) => {
                    warn!(%kind, %err, "backend could not set up outputs");
                    reasons.push(format!("{kind}: {err}"));
                    scene.tear_down();
                }
            }
        }
        Err(reasons)
    }

    fn start_failed(&mut self, reasons: Vec<String>) -> CompositorError {
        let err = CompositorError::AllBackendsFailed { reasons };
        self.not_possible_reason = err.to_string();
        error!(%err, "compositing disabled");
        if self.platform.requires_compositing() {
            error!("the windowing system requires compositing");
        }
        self.set_state(CompositorState::Off);
        if self.selection_owned {
            self.platform.release_selection();
            self.selection_owned = false;
        }
        err
    }

    /// Stops compositing. In-flight swaps are forgotten and no pass runs
    /// until compositing starts again.
    pub fn stop(&mut self) {
        if matches!(self.state, CompositorState::Off | CompositorState::Stopping) {
            return;
        }
        self.about_to_toggle_compositing.emit(&());
        self.set_state(CompositorState::Stopping);
        self.about_to_destroy.emit(&());

        if let Some(mut scene) = self.scene.take() {
            scene.tear_down();
        }
        let remnants: Vec<WindowId> = self
            .space
            .windows_in_stacking_order()
            .filter(|w| w.is_remnant())
            .map(Window::id)
            .collect();
        for id in remnants {
            self.space.remove_window(id);
        }
        self.space.finish_compositing();
        self.targets.clear();

        self.set_state(CompositorState::Off);
        info!("compositing stopped");
        self.compositing_toggled.emit(&false);
    }

    /// Suspends compositing for `reason`.
    ///
    /// The compositing selection is released after the configured delay
    /// unless compositing comes back before that. Platforms that require
    /// compositing ignore this.
    pub fn suspend(&mut self, reason: SuspendReasons, now: HostTime) {
        debug_assert!(!reason.is_empty(), "suspend needs a reason");
        if self.platform.requires_compositing() {
            debug!("compositing cannot be suspended on this platform");
            return;
        }
        self.suspended |= reason;
        if reason.contains(SuspendReasons::SCRIPT) {
            info!("desktop effects were suspended by another application; toggle compositing to resume");
        }
        let deadline = self.selection_release.start(now);
        self.timer_armed(TimerKind::SelectionRelease, None, now, deadline);
        self.stop();
    }

    /// Clears `reason` and starts compositing if no other reason is left.
    pub fn resume(&mut self, reason: SuspendReasons, now: HostTime) -> Result<(), CompositorError> {
        debug_assert!(!reason.is_empty(), "resume needs a reason");
        self.suspended.remove(reason);
        self.start(now)
    }

    /// The user shortcut: resumes from every reason when suspended,
    /// otherwise suspends by the user.
    pub fn toggle_compositing(&mut self, now: HostTime) {
        if self.platform.requires_compositing() {
            return;
        }
        if self.suspended.is_empty() {
            self.suspend(SuspendReasons::USER, now);
        } else if let Err(err) = self.resume(SuspendReasons::all(), now) {
            warn!(%err, "compositing could not be resumed");
        }
    }

    /// Clears every suspend reason and restarts compositing.
    pub fn reinitialize(&mut self, now: HostTime) -> Result<(), CompositorError> {
        self.suspended = SuspendReasons::empty();
        self.stop();
        self.start(now)
    }

    /// Applies new settings.
    ///
    /// While suspended this only makes sure compositing is stopped;
    /// otherwise compositing restarts with the new settings.
    pub fn reconfigure(
        &mut self,
        config: CompositorConfig,
        now: HostTime,
    ) -> Result<(), CompositorError> {
        self.selection_release
            .set_delay(config.selection_release_delay());
        self.support
            .timer_mut()
            .set_delay(config.selection_release_delay());
        self.config = config;
        if !self.suspended.is_empty() {
            self.stop();
            return Ok(());
        }
        self.stop();
        self.start(now)
    }

    /// Suspends while `window` asks to block compositing; with `None`,
    /// resumes once no window blocks any more.
    pub fn update_client_composite_blocking(&mut self, window: Option<WindowId>, now: HostTime) {
        match window {
            Some(id) => {
                let blocks = self.space.get(id).is_some_and(Window::blocks_compositing);
                if blocks && !self.suspended.contains(SuspendReasons::BLOCK_RULE) {
                    debug!(window = ?id, "window blocks compositing");
                    self.suspend(SuspendReasons::BLOCK_RULE, now);
                }
            }
            None => {
                if self.suspended.contains(SuspendReasons::BLOCK_RULE)
                    && !self.space.blocking_window_present()
                {
                    debug!("no window blocks compositing any more");
                    if let Err(err) = self.resume(SuspendReasons::BLOCK_RULE, now) {
                        debug!(%err, "compositing stays off");
                    }
                }
            }
        }
    }

    /// Re-reads the outputs from the platform after one was added, removed
    /// or changed, and repaints everything.
    pub fn outputs_changed(&mut self, now: HostTime) {
        let outputs = self.platform.outputs();
        let old = self.space.outputs().to_vec();
        for previous in &old {
            let current = outputs.iter().find(|o| o.id == previous.id);
            if current == Some(previous) {
                continue;
            }
            if let Some(scene) = self.scene.as_mut() {
                scene.remove_output(previous.id);
            }
            if current.is_none() {
                debug!(output = ?previous.id, "output removed");
                self.space.remove_output(previous.id);
                self.presentation.output_removed(previous.id);
            }
        }
        if let Some(scene) = self.scene.as_mut() {
            for output in &outputs {
                if old.contains(output) {
                    continue;
                }
                if let Err(err) = scene.add_output(output) {
                    warn!(output = ?output.id, %err, "could not set up output");
                }
            }
        }
        let per_output = self.config.scheduling == SchedulingMode::PerOutput;
        self.space.set_outputs(outputs, per_output);
        if self.is_active() {
            self.sync_targets();
            self.add_repaint_full(now);
        }
    }

    // --- locking and screen lock ---

    /// Ignores repaint requests until the matching [`unlock`](Self::unlock).
    pub fn lock(&mut self) {
        self.locked += 1;
    }

    /// Undoes one [`lock`](Self::lock); the last one repaints everything.
    pub fn unlock(&mut self, now: HostTime) {
        debug_assert!(self.locked > 0, "unlock without lock");
        self.locked = self.locked.saturating_sub(1);
        if self.locked == 0 {
            self.add_repaint_full(now);
        }
    }

    /// Returns `true` while repaint requests are ignored.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked > 0
    }

    /// Shows only lock-screen and input-method windows while `locked`.
    pub fn set_screen_locked(&mut self, locked: bool, now: HostTime) {
        if let Some(scene) = self.scene.as_mut() {
            scene.set_screen_locked(locked);
        }
        self.add_repaint_full(now);
    }

    // --- support properties ---

    /// Keeps a support property that was scheduled for deletion.
    pub fn keep_support_property(&mut self, atom: Atom) {
        self.support.keep(atom);
    }

    /// Deletes a support property after the release delay.
    pub fn remove_support_property(&mut self, atom: Atom, now: HostTime) {
        if let Some(deadline) = self.support.remove(atom, now) {
            self.timer_armed(TimerKind::SupportCleanup, None, now, deadline);
        }
    }

    // --- repaint requests ---

    /// Repaints a global region.
    pub fn add_repaint(&mut self, region: &Region, now: HostTime) {
        if !self.is_active() || self.is_locked() || region.is_empty() {
            return;
        }
        let mut armed = Vec::new();
        for target in &mut self.targets {
            let part = match target.output {
                None => region.clone(),
                Some(id) => match self.space.output(id) {
                    Some(output) => region.intersected(&Region::from_rect(output.geometry)),
                    None => continue,
                },
            };
            if part.is_empty() {
                continue;
            }
            target.repaints.union(&part);
            if let Some(deadline) = target.scheduler.schedule(now) {
                armed.push((target.output, deadline));
            }
        }
        for (output, deadline) in armed {
            self.timer_armed(TimerKind::Composite, output, now, deadline);
        }
    }

    /// Repaints a global rectangle.
    pub fn add_repaint_rect(&mut self, rect: Rect, now: HostTime) {
        self.add_repaint(&Region::from_rect(rect), now);
    }

    /// Repaints every output.
    pub fn add_repaint_full(&mut self, now: HostTime) {
        let mut screen = Region::new();
        for output in self.space.outputs() {
            screen.union_rect(output.geometry);
        }
        self.add_repaint(&screen, now);
    }

    /// Schedules a pass for the outputs that show `window` or owe it a
    /// repaint. The window's own repaint regions say what to paint.
    pub fn schedule_repaint(&mut self, window: WindowId, now: HostTime) {
        if !self.is_active() || self.is_locked() {
            return;
        }
        let Some(win) = self.space.get(window) else {
            return;
        };
        let visible = win.visible_rect();
        let owing = win.damage().repaint_outputs().clone();
        let mut armed = Vec::new();
        for target in &mut self.targets {
            let wanted = match target.output {
                None => true,
                Some(id) => {
                    owing.contains(&id)
                        || self
                            .space
                            .output(id)
                            .is_some_and(|o| o.geometry.intersects(visible))
                }
            };
            if wanted {
                if let Some(deadline) = target.scheduler.schedule(now) {
                    armed.push((target.output, deadline));
                }
            }
        }
        for (output, deadline) in armed {
            self.timer_armed(TimerKind::Composite, output, now, deadline);
        }
    }

    /// Makes sure `window` gets a frame callback soon, from the output it
    /// overlaps the most, even if nothing is damaged.
    pub fn schedule_frame_callback(&mut self, window: WindowId, now: HostTime) {
        if !self.is_active() || self.is_locked() {
            return;
        }
        let Some(win) = self.space.get(window) else {
            return;
        };
        let Some(output) = max_coverage_output(self.space.outputs(), win.visible_rect()) else {
            return;
        };
        let Some(target) = self
            .targets
            .iter_mut()
            .find(|t| t.output.is_none() || t.output == Some(output))
        else {
            return;
        };
        if !target.frame_requests.contains(&window) {
            target.frame_requests.push(window);
        }
        if let Some(deadline) = target.scheduler.schedule(now) {
            let output = target.output;
            self.timer_armed(TimerKind::Composite, output, now, deadline);
        }
    }

    /// A frame is about to be handed to the display outside of a pass;
    /// holds the next pass of `output` until its swap completes.
    pub fn about_to_swap_buffers(&mut self, output: Option<OutputId>) {
        if let Some(target) = self.target_mut(output) {
            target.scheduler.begin_swap();
        }
    }

    /// The display finished the swap of `output` (`None` for the whole
    /// screen). Ignored when no swap is pending.
    ///
    /// `presented` is the display's feedback; without it, feedback is
    /// synthesized from `now`.
    pub fn buffer_swap_complete(
        &mut self,
        output: Option<OutputId>,
        presented: Option<PresentationData>,
        now: HostTime,
    ) {
        let fallback = self.config.fallback_refresh_rate_mhz;
        let Some(target) = self.target_mut(output) else {
            return;
        };
        if !target.scheduler.is_swap_pending() {
            trace!(?output, "swap completion without pending swap");
            return;
        }
        let target_output = target.output;

        // Feedback for this frame goes out before the next pass is timed.
        match target_output.and_then(|id| self.space.output(id).copied()) {
            Some(info) => {
                let data = presented.unwrap_or_else(|| {
                    PresentationData::software(
                        now,
                        info.refresh_interval(fallback),
                        PresentationKinds::HARDWARE_FLIP,
                    )
                });
                self.deliver_feedback(&info, data);
            }
            None => {
                let outputs = self.space.outputs().to_vec();
                self.presentation.software_presented(
                    &outputs,
                    PresentationKinds::VSYNC,
                    now,
                    fallback,
                );
            }
        }

        let Some((delay, deadline)) = self
            .target_mut(output)
            .and_then(|target| target.scheduler.swap_complete(now))
        else {
            return;
        };
        self.tracer().swap_complete(&SwapCompleteEvent {
            output: target_output,
            timestamp: now,
            next_delay: delay,
        });
        if let Some(deadline) = deadline {
            self.timer_armed(TimerKind::Composite, target_output, now, deadline);
        }
    }

    // --- event loop ---

    /// Earliest deadline the host loop has to wake up for.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        self.targets
            .iter()
            .filter_map(|t| t.scheduler.deadline())
            .chain(self.selection_release.deadline())
            .chain(self.support.timer().deadline())
            .min()
    }

    /// Processes space events, fires due timers and runs due passes.
    pub fn tick(&mut self, now: HostTime) {
        self.process_events(now);
        self.fire_timers(now);
        self.perform_compositing(now);
    }

    /// Feeds queued space events to the scene and reacts to them.
    pub fn process_events(&mut self, now: HostTime) {
        loop {
            let events = self.space.take_events();
            if events.is_empty() {
                if !self.release_remnants() {
                    break;
                }
                continue;
            }
            if let Some(scene) = self.scene.as_mut() {
                scene.handle_events(&events, &self.space);
            }
            for event in events {
                self.react(event, now);
            }
        }
        for rect in self.space.take_workspace_repaints() {
            self.add_repaint_rect(rect, now);
        }
        self.apply_effect_repaints(now);
        for deferred in core::mem::take(&mut self.deferred) {
            match deferred {
                Deferred::CompositeBlocking(window) => {
                    self.update_client_composite_blocking(window, now);
                }
            }
        }
    }

    fn react(&mut self, event: SpaceEvent, now: HostTime) {
        match event {
            SpaceEvent::NeedsRepaint(id) | SpaceEvent::Shown(id) => self.schedule_repaint(id, now),
            SpaceEvent::Closed(id) => {
                let referenced = self
                    .scene
                    .as_ref()
                    .is_some_and(|s| s.effects().state().is_remnant_referenced(id));
                if !referenced {
                    self.space.remove_window(id);
                }
            }
            SpaceEvent::Removed(id) => {
                self.presentation.window_destroyed(id);
                for target in &mut self.targets {
                    target.frame_requests.retain(|w| *w != id);
                }
                if self.suspended.contains(SuspendReasons::BLOCK_RULE) {
                    self.deferred.push(Deferred::CompositeBlocking(None));
                }
            }
            SpaceEvent::BlockingChanged(id) => {
                let blocks = self.space.get(id).is_some_and(Window::blocks_compositing);
                self.deferred
                    .push(Deferred::CompositeBlocking(blocks.then_some(id)));
            }
            _ => {}
        }
    }

    /// Removes closed windows no effect holds any more. Returns `true` if
    /// any was removed.
    fn release_remnants(&mut self) -> bool {
        let Some(scene) = self.scene.as_mut() else {
            return false;
        };
        let released = scene.effects_mut().state_mut().take_released_remnants();
        let mut removed = false;
        for id in released {
            if self.space.get(id).is_some_and(Window::is_remnant) {
                self.space.remove_window(id);
                removed = true;
            }
        }
        removed
    }

    fn apply_effect_repaints(&mut self, now: HostTime) {
        let Some(scene) = self.scene.as_mut() else {
            return;
        };
        let request = scene.effects_mut().state_mut().take_repaints();
        if request.full {
            self.add_repaint_full(now);
        } else {
            self.add_repaint(&request.region, now);
        }
    }

    fn fire_timers(&mut self, now: HostTime) {
        if self.selection_release.take_due(now) {
            match ReleaseAction::for_state(self.state) {
                ReleaseAction::Keep => {}
                ReleaseAction::Release => {
                    if self.selection_owned {
                        debug!("releasing compositor selection");
                        self.platform.release_selection();
                        self.selection_owned = false;
                    }
                }
                ReleaseAction::Retry => {
                    let deadline = self.selection_release.start(now);
                    self.timer_armed(TimerKind::SelectionRelease, None, now, deadline);
                }
            }
        }
        if self.support.timer_mut().take_due(now) {
            if ReleaseAction::for_state(self.state) == ReleaseAction::Retry {
                let deadline = self.support.timer_mut().start(now);
                self.timer_armed(TimerKind::SupportCleanup, None, now, deadline);
            } else {
                for atom in self.support.take_unused() {
                    self.platform.delete_support_property(atom);
                }
            }
        }
    }

    // --- passes ---

    /// Runs every pass whose deadline has been reached.
    ///
    /// Nothing runs while compositing is off or every output is disabled;
    /// in the latter case pending timers are dropped and the repaints are
    /// kept for when an output comes back.
    #[tracing::instrument(skip(self))]
    pub fn perform_compositing(&mut self, now: HostTime) {
        if !self.is_active() {
            return;
        }
        if !self.platform.outputs_enabled() {
            for target in &mut self.targets {
                if !target.scheduler.is_swap_pending() {
                    target.scheduler.cancel();
                }
            }
            return;
        }
        for idx in 0..self.targets.len() {
            if self.targets[idx].scheduler.take_due(now) {
                self.composite(idx, now);
            }
        }
    }

    fn composite(&mut self, idx: usize, now: HostTime) {
        let target_output = self.targets[idx].output;
        self.pass_index += 1;
        let begin = PassBeginEvent {
            pass_index: self.pass_index,
            output: target_output,
            timestamp: now,
        };
        self.tracer().pass_begin(&begin);
        let mut summary = PassSummaryBuilder::new(&begin);

        summary.phase_begin(PhaseKind::Fetch, now);
        self.fetch_damage();
        let Some(damage) = self.take_repaints(idx) else {
            summary.phase_end(PhaseKind::Fetch, self.platform.now());
            self.pass_idle(idx, now);
            return;
        };
        let frame_requests = core::mem::take(&mut self.targets[idx].frame_requests);
        let fetched = self.platform.now();
        summary.phase_end(PhaseKind::Fetch, fetched);

        summary.phase_begin(PhaseKind::Paint, fetched);
        let outputs: Vec<OutputInfo> = self
            .space
            .outputs()
            .iter()
            .filter(|o| o.enabled && target_output.is_none_or(|id| o.id == id))
            .copied()
            .collect();
        let mut passes = Vec::with_capacity(outputs.len());
        let mut elapsed = Duration::ZERO;
        let mut failed = false;
        if let Some(scene) = self.scene.as_mut() {
            let platform = &self.platform;
            let clock = || platform.now();
            for output in outputs {
                let output_damage = damage.intersected(&Region::from_rect(output.geometry));
                if output_damage.is_empty() {
                    passes.push(OutputPass {
                        output,
                        windows: Vec::new(),
                        feedback: None,
                        swap_pending: false,
                    });
                    continue;
                }
                match scene.paint(&mut self.space, &output, &output_damage, now, &clock) {
                    Ok(outcome) => {
                        elapsed = elapsed + outcome.elapsed;
                        passes.push(OutputPass {
                            output,
                            windows: outcome.windows,
                            feedback: outcome.presented.feedback,
                            swap_pending: outcome.presented.swap_pending,
                        });
                    }
                    Err(err) => {
                        warn!(output = ?output.id, %err, "pass failed");
                        self.targets[idx].repaints.union(&output_damage);
                        failed = true;
                    }
                }
            }
        }
        let painted = self.platform.now();
        summary.phase_end(PhaseKind::Paint, painted);

        summary.phase_begin(PhaseKind::Present, painted);
        let window_count = self.present(&passes, &frame_requests, painted);
        let swap_pending = passes.iter().any(|p| p.swap_pending);
        let scheduler = &mut self.targets[idx].scheduler;
        let deadline = if failed {
            scheduler.pass_failed(painted)
        } else {
            scheduler.pass_finished(painted, elapsed, swap_pending)
        };
        if let Some(deadline) = deadline {
            self.timer_armed(TimerKind::Composite, target_output, painted, deadline);
        }
        summary.phase_end(PhaseKind::Present, self.platform.now());

        summary.set_painted(window_count, damage.area());
        let summary = summary.finish();
        self.tracer().pass_summary(&summary);
        trace!(pass = self.pass_index, windows = window_count, "pass done");

        self.apply_effect_repaints(painted);
        if self.release_remnants() {
            self.process_events(painted);
        }
    }

    /// Sends frame callbacks and immediate feedback for a finished pass.
    /// Returns the number of windows painted.
    fn present(&mut self, passes: &[OutputPass], frame_requests: &[WindowId], now: HostTime) -> u32 {
        let fallback = self.config.fallback_refresh_rate_mhz;
        let mut count = 0_u32;
        for pass in passes {
            count = count.saturating_add(u32::try_from(pass.windows.len()).unwrap_or(u32::MAX));
            let mut ids = pass.windows.clone();
            for id in frame_requests {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
            let windows = ids.iter().filter_map(|id| self.space.get(*id));
            self.presentation
                .lock(pass.output.id, windows, self.space.outputs(), now);

            if pass.swap_pending {
                continue;
            }
            let data = pass.feedback.unwrap_or_else(|| {
                PresentationData::software(
                    now,
                    pass.output.refresh_interval(fallback),
                    PresentationKinds::empty(),
                )
            });
            self.deliver_feedback(&pass.output, data);
        }
        count
    }

    fn deliver_feedback(&mut self, output: &OutputInfo, data: PresentationData) {
        let surfaces = self.presentation.presented(output, data);
        self.tracer().present_feedback(&PresentFeedbackEvent {
            output: output.id,
            data,
            surfaces,
        });
    }

    /// Starts damage round trips for every damaged window and consumes the
    /// replies.
    fn fetch_damage(&mut self) {
        let ids = self.space.stacking_order().to_vec();
        let mut damaged = Vec::new();
        for id in ids {
            let protocol = self.platform.damage_protocol();
            if self.space.reset_and_fetch_damage(id, protocol) {
                damaged.push(id);
            }
        }
        for id in damaged {
            if let Some(scene) = self.scene.as_mut() {
                scene
                    .effects_mut()
                    .discard_cached_texture(lead_of_annexed(&self.space, id));
            }
            let protocol = self.platform.damage_protocol();
            self.space.get_damage_region_reply(id, protocol);
        }
    }

    /// Drains the repaints a pass of target `idx` has to paint, or returns
    /// `None` if there is nothing to do.
    fn take_repaints(&mut self, idx: usize) -> Option<Region> {
        let target_output = self.targets[idx].output;
        let geometry = target_output
            .and_then(|id| self.space.output(id))
            .map(|o| Region::from_rect(o.geometry));

        let owing: Vec<WindowId> = self
            .space
            .windows_in_stacking_order()
            .filter(|w| match target_output {
                None => w.has_pending_repaints(),
                Some(id) => w.damage().repaint_outputs().contains(&id),
            })
            .map(Window::id)
            .collect();
        let target = &mut self.targets[idx];
        if target.repaints.is_empty() && owing.is_empty() && target.frame_requests.is_empty() {
            return None;
        }

        let mut damage = core::mem::take(&mut target.repaints);
        for id in owing {
            if let Some(window) = self.space.get(id) {
                damage.union(&window.repaints());
            }
            self.space.reset_repaints(id, target_output);
        }
        if let Some(geometry) = geometry {
            damage.intersect(&geometry);
        }
        Some(damage)
    }

    fn pass_idle(&mut self, idx: usize, now: HostTime) {
        let target = &mut self.targets[idx];
        let output = target.output;
        if let Some(deadline) = target.scheduler.pass_idle(now) {
            self.timer_armed(TimerKind::Composite, output, now, deadline);
        }
        let all_idle = self.targets.iter().all(|t| {
            t.repaints.is_empty() && t.scheduler.state() == FrameState::Idle
        });
        if all_idle {
            if let Some(scene) = self.scene.as_mut() {
                scene.idle();
            }
        }
    }

    // --- helpers ---

    fn set_state(&mut self, state: CompositorState) {
        if self.state != state {
            self.state = state;
            self.state_changed.emit(&state);
        }
    }

    fn target_mut(&mut self, output: Option<OutputId>) -> Option<&mut RepaintTarget> {
        match self.config.scheduling {
            SchedulingMode::Global => self.targets.first_mut(),
            SchedulingMode::PerOutput => self
                .targets
                .iter_mut()
                .find(|t| output.is_some() && t.output == output),
        }
    }

    fn rebuild_targets(&mut self) {
        self.targets.clear();
        self.sync_targets();
    }

    /// Makes the targets match the current outputs, keeping the state of
    /// outputs that are still there.
    fn sync_targets(&mut self) {
        let scheduler = self.config.scheduler();
        let fallback = self.config.fallback_refresh_rate_mhz;
        let outputs = self.space.outputs();
        match self.config.scheduling {
            SchedulingMode::Global => {
                let refresh = outputs
                    .iter()
                    .find(|o| o.enabled)
                    .map_or(Duration::from_refresh_millihertz(fallback), |o| {
                        o.refresh_interval(fallback)
                    });
                match self.targets.first_mut() {
                    Some(target) => target.scheduler.set_refresh(refresh),
                    None => self
                        .targets
                        .push(RepaintTarget::new(None, FrameScheduler::new(scheduler, refresh))),
                }
            }
            SchedulingMode::PerOutput => {
                self.targets
                    .retain(|t| t.output.is_some_and(|id| outputs.iter().any(|o| o.id == id)));
                for output in outputs {
                    let refresh = output.refresh_interval(fallback);
                    match self.targets.iter_mut().find(|t| t.output == Some(output.id)) {
                        Some(target) => target.scheduler.set_refresh(refresh),
                        None => self.targets.push(RepaintTarget::new(
                            Some(output.id),
                            FrameScheduler::new(scheduler, refresh),
                        )),
                    }
                }
            }
        }
    }

    fn tracer(&mut self) -> Tracer<'_> {
        match self.trace_sink.as_deref_mut() {
            Some(sink) => Tracer::new(sink),
            None => Tracer::none(),
        }
    }

    fn timer_armed(
        &mut self,
        kind: TimerKind,
        output: Option<OutputId>,
        now: HostTime,
        deadline: HostTime,
    ) {
        trace!(?kind, ?output, ?deadline, "timer armed");
        self.tracer().timer_armed(&TimerArmedEvent {
            kind,
            output,
            armed_at: now,
            deadline,
        });
    }
}

/// Follows annexed transients up to the window they are painted with.
fn lead_of_annexed(space: &Space, mut id: WindowId) -> WindowId {
    for _ in 0..space.len() {
        match space.get(id).and_then(Window::lead) {
            Some(lead) => id = lead,
            None => break,
        }
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_of_annexed_follows_the_chain() {
        let mut space = Space::new();
        let root = space.add_window(Window::new(
            vitrail_core::window::WindowKind::Toplevel,
            Rect::new(0, 0, 100, 100),
        ));
        let child = space.add_window(Window::new(
            vitrail_core::window::WindowKind::Popup,
            Rect::new(10, 10, 20, 20),
        ));
        let grandchild = space.add_window(Window::new(
            vitrail_core::window::WindowKind::Popup,
            Rect::new(12, 12, 5, 5),
        ));
        space.annex(child, root);
        space.annex(grandchild, child);

        assert_eq!(lead_of_annexed(&space, grandchild), root);
        assert_eq!(lead_of_annexed(&space, root), root);
    }
}
