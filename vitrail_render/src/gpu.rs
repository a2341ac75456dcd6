// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU-accelerated backend.
//!
//! [`GpuBackend`] holds the API-independent parts: per-output buffer-age
//! state, the texture set, and the safe-point protocol used to detect
//! drivers that hang during the first frames. Everything that talks to the
//! graphics API lives behind [`GpuDevice`].

use hashbrown::{HashMap, HashSet};
use tracing::{debug, warn};
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::presentation::PresentationData;
use vitrail_core::region::Region;

use crate::backend::{Backend, CompositingType, Frame, PresentOutcome, TextureUpload};
use crate::buffer_age::OutputRenderState;
use crate::error::{BackendError, BackendResult};
use crate::resource::ResourceKey;

/// Points around initialization and the first frames at which the platform
/// may record progress, so a crash can be attributed to the GPU driver on
/// the next start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SafePoint {
    /// Before the device is initialized.
    PreInit,
    /// After the device initialized successfully.
    PostInit,
    /// Before a guarded frame is rendered.
    PreFrame,
    /// After a guarded frame was rendered.
    PostFrame,
    /// After the last guarded frame.
    PostLastGuardedFrame,
}

/// Graphics API access used by [`GpuBackend`].
pub trait GpuDevice {
    /// Creates the context and checks required extensions.
    fn init(&mut self) -> BackendResult<()>;

    /// Returns `true` if swapchain buffers report their age.
    fn supports_buffer_age(&self) -> bool;

    /// Returns `true` if swap completion arrives as an asynchronous event.
    fn has_swap_event(&self) -> bool;

    /// Creates a window surface for `output` and returns the number of
    /// buffers in its swapchain.
    fn create_surface(&mut self, output: &OutputInfo) -> BackendResult<u8>;

    /// Destroys the surface of `output`.
    fn destroy_surface(&mut self, output: OutputId);

    /// Uploads damaged window content.
    fn upload_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()>;

    /// Frees a window texture.
    fn release_texture(&mut self, key: ResourceKey);

    /// Records the frame's draw calls.
    fn draw(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()>;

    /// Swaps buffers. Returns feedback when completion is known right away.
    fn swap_buffers(
        &mut self,
        output: OutputId,
        damaged: &Region,
    ) -> BackendResult<Option<PresentationData>>;

    /// Records a safe point. The default does nothing.
    fn safe_point(&mut self, point: SafePoint) {
        let _ = point;
    }
}

#[derive(Debug)]
struct GpuOutput {
    state: OutputRenderState,
    committed: Option<Region>,
}

/// A backend rendering through a [`GpuDevice`].
#[derive(Debug)]
pub struct GpuBackend<D> {
    device: D,
    outputs: HashMap<OutputId, GpuOutput>,
    textures: HashSet<ResourceKey>,
    guarded_frames: u32,
    torn_down: bool,
}

impl<D: GpuDevice> GpuBackend<D> {
    /// Initializes `device`. The first `guarded_frames` frames are wrapped
    /// in [`SafePoint::PreFrame`] / [`SafePoint::PostFrame`].
    pub fn new(mut device: D, guarded_frames: u32) -> BackendResult<Self> {
        debug!("initializing GPU device");
        device.safe_point(SafePoint::PreInit);
        device.init()?;
        device.safe_point(SafePoint::PostInit);
        Ok(Self {
            device,
            outputs: HashMap::new(),
            textures: HashSet::new(),
            guarded_frames,
            torn_down: false,
        })
    }

    /// The underlying device.
    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Buffer-age state of an output.
    #[must_use]
    pub fn render_state(&self, output: OutputId) -> Option<&OutputRenderState> {
        self.outputs.get(&output).map(|o| &o.state)
    }

    /// Guarded frames still to go.
    #[must_use]
    pub fn guarded_frames(&self) -> u32 {
        self.guarded_frames
    }

    fn check_alive(&self) -> BackendResult<()> {
        if self.torn_down {
            Err(BackendError::lost("GPU backend was torn down"))
        } else {
            Ok(())
        }
    }

    fn output_mut(&mut self, id: OutputId) -> BackendResult<&mut GpuOutput> {
        self.outputs
            .get_mut(&id)
            .ok_or_else(|| BackendError::lost(format!("no surface for output {id:?}")))
    }
}

impl<D: GpuDevice> Backend for GpuBackend<D> {
    fn compositing_type(&self) -> CompositingType {
        CompositingType::Gpu
    }

    fn supports_buffer_age(&self) -> bool {
        self.device.supports_buffer_age()
    }

    fn has_swap_event(&self) -> bool {
        self.device.has_swap_event()
    }

    fn add_output(&mut self, output: &OutputInfo) -> BackendResult<()> {
        self.check_alive()?;
        let buffers = self.device.create_surface(output)?;
        debug!(output = ?output.id, buffers, "created GPU surface");
        self.outputs.insert(
            output.id,
            GpuOutput {
                state: OutputRenderState::new(output.geometry, buffers),
                committed: None,
            },
        );
        Ok(())
    }

    fn remove_output(&mut self, output: OutputId) {
        if self.outputs.remove(&output).is_some() {
            self.device.destroy_surface(output);
        }
    }

    fn prepare_rendering_frame(
        &mut self,
        output: &OutputInfo,
        damage: &Region,
    ) -> BackendResult<Region> {
        self.check_alive()?;
        if self.guarded_frames > 0 {
            self.device.safe_point(SafePoint::PreFrame);
        }
        let buffer_age = self.device.supports_buffer_age();
        let slot = self.output_mut(output.id)?;
        if slot.state.geometry() != output.geometry {
            slot.state.reset(output.geometry);
        }
        slot.committed = None;
        let repair = slot.state.begin_frame(damage);
        if buffer_age {
            Ok(repair)
        } else {
            Ok(Region::from_rect(output.geometry))
        }
    }

    fn update_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
        self.check_alive()?;
        self.device.upload_texture(upload)?;
        self.textures.insert(upload.key);
        Ok(())
    }

    fn release_texture(&mut self, key: ResourceKey) {
        if self.textures.remove(&key) {
            self.device.release_texture(key);
        }
    }

    fn render(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()> {
        self.check_alive()?;
        self.device.draw(output, frame)
    }

    fn end_rendering_frame(
        &mut self,
        output: OutputId,
        _rendered: &Region,
        damaged: &Region,
    ) -> BackendResult<()> {
        self.check_alive()?;
        // The damage joins the buffer-age history once the swap succeeded.
        self.output_mut(output)?.committed = Some(damaged.clone());
        if self.guarded_frames > 0 {
            self.device.safe_point(SafePoint::PostFrame);
            self.guarded_frames -= 1;
            if self.guarded_frames == 0 {
                self.device.safe_point(SafePoint::PostLastGuardedFrame);
            }
        }
        Ok(())
    }

    fn present(&mut self, output: OutputId) -> BackendResult<PresentOutcome> {
        self.check_alive()?;
        let Some(damaged) = self.output_mut(output)?.committed.take() else {
            return Ok(PresentOutcome::immediate(None));
        };
        let feedback = match self.device.swap_buffers(output, &damaged) {
            Ok(feedback) => feedback,
            Err(err) => {
                warn!(?output, %err, "buffer swap failed");
                // The back buffers hold unknown content now.
                let slot = self.output_mut(output)?;
                let geometry = slot.state.geometry();
                slot.state.reset(geometry);
                return Err(err);
            }
        };
        self.output_mut(output)?.state.end_frame(&damaged);
        if self.device.has_swap_event() {
            Ok(PresentOutcome::PENDING)
        } else {
            Ok(PresentOutcome::immediate(feedback))
        }
    }

    fn tear_down(&mut self) {
        if self.torn_down {
            return;
        }
        debug!("tearing down GPU backend");
        for key in self.textures.drain() {
            self.device.release_texture(key);
        }
        for (id, _) in self.outputs.drain() {
            self.device.destroy_surface(id);
        }
        self.torn_down = true;
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
