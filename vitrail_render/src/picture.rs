// Copyright 2026 the Vitrail Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Legacy picture-compositing backend.
//!
//! The display server composites server-side pictures on request. There is
//! no buffer age and no swap event: every frame repaints the whole output
//! into an off-screen picture which is then copied to the screen on flush.

use hashbrown::{HashMap, HashSet};
use tracing::debug;
use vitrail_core::output::{OutputId, OutputInfo};
use vitrail_core::region::{Rect, Region};

use crate::backend::{Backend, CompositingType, Frame, PresentOutcome, TextureUpload};
use crate::error::{BackendError, BackendResult};
use crate::resource::ResourceKey;

/// Display-server connection used by [`PictureBackend`].
pub trait PictureConnection {
    /// Checks that the render and composite extensions are usable.
    fn query_extensions(&mut self) -> BackendResult<()>;

    /// Creates the off-screen buffer picture for an output.
    fn create_buffer(&mut self, output: &OutputInfo) -> BackendResult<()>;

    /// Frees an output's buffer picture.
    fn destroy_buffer(&mut self, output: OutputId);

    /// Creates or refreshes the picture of a window pixmap.
    fn update_picture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()>;

    /// Frees a window picture.
    fn free_picture(&mut self, key: ResourceKey);

    /// Issues the composite requests for a frame.
    fn composite(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()>;

    /// Copies the buffer picture to the screen and flushes the connection.
    fn flush(&mut self, output: OutputId, area: Rect) -> BackendResult<()>;
}

/// A backend compositing through server-side pictures.
#[derive(Debug)]
pub struct PictureBackend<C> {
    connection: C,
    outputs: HashMap<OutputId, Rect>,
    pending: HashSet<OutputId>,
    pictures: HashSet<ResourceKey>,
    torn_down: bool,
}

impl<C: PictureConnection> PictureBackend<C> {
    /// Checks the connection's extensions and creates the backend.
    pub fn new(mut connection: C) -> BackendResult<Self> {
        debug!("creating legacy picture backend");
        connection.query_extensions()?;
        Ok(Self {
            connection,
            outputs: HashMap::new(),
            pending: HashSet::new(),
            pictures: HashSet::new(),
            torn_down: false,
        })
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &C {
        &self.connection
    }

    fn check_alive(&self) -> BackendResult<()> {
        if self.torn_down {
            Err(BackendError::lost("picture backend was torn down"))
        } else {
            Ok(())
        }
    }
}

impl<C: PictureConnection> Backend for PictureBackend<C> {
    fn compositing_type(&self) -> CompositingType {
        CompositingType::LegacyPicture
    }

    fn supports_buffer_age(&self) -> bool {
        false
    }

    fn has_swap_event(&self) -> bool {
        false
    }

    fn add_output(&mut self, output: &OutputInfo) -> BackendResult<()> {
        self.check_alive()?;
        self.connection.create_buffer(output)?;
        self.outputs.insert(output.id, output.geometry);
        Ok(())
    }

    fn remove_output(&mut self, output: OutputId) {
        if self.outputs.remove(&output).is_some() {
            self.pending.remove(&output);
            self.connection.destroy_buffer(output);
        }
    }

    fn prepare_rendering_frame(
        &mut self,
        output: &OutputInfo,
        _damage: &Region,
    ) -> BackendResult<Region> {
        self.check_alive()?;
        let geometry = self
            .outputs
            .get_mut(&output.id)
            .ok_or_else(|| BackendError::lost(format!("no buffer for output {:?}", output.id)))?;
        if *geometry != output.geometry {
            self.connection.destroy_buffer(output.id);
            self.connection.create_buffer(output)?;
            *geometry = output.geometry;
        }
        self.pending.remove(&output.id);
        Ok(Region::from_rect(output.geometry))
    }

    fn update_texture(&mut self, upload: TextureUpload<'_>) -> BackendResult<()> {
        self.check_alive()?;
        self.connection.update_picture(upload)?;
        self.pictures.insert(upload.key);
        Ok(())
    }

    fn release_texture(&mut self, key: ResourceKey) {
        if self.pictures.remove(&key) {
            self.connection.free_picture(key);
        }
    }

    fn render(&mut self, output: &OutputInfo, frame: &Frame) -> BackendResult<()> {
        self.check_alive()?;
        self.connection.composite(output, frame)
    }

    fn end_rendering_frame(
        &mut self,
        output: OutputId,
        _rendered: &Region,
        _damaged: &Region,
    ) -> BackendResult<()> {
        self.check_alive()?;
        self.pending.insert(output);
        Ok(())
    }

    fn present(&mut self, output: OutputId) -> BackendResult<PresentOutcome> {
        self.check_alive()?;
        if !self.pending.remove(&output) {
            return Ok(PresentOutcome::immediate(None));
        }
        let area = self
            .outputs
            .get(&output)
            .copied()
            .ok_or_else(|| BackendError::lost(format!("no buffer for output {output:?}")))?;
        self.connection.flush(output, area)?;
        Ok(PresentOutcome::immediate(None))
    }

    fn tear_down(&mut self) {
        if self.torn_down {
            return;
        }
        debug!("tearing down legacy picture backend");
        for key in self.pictures.drain() {
            self.connection.free_picture(key);
        }
        for (id, _) in self.outputs.drain() {
            self.connection.destroy_buffer(id);
        }
        self.pending.clear();
        self.torn_down = true;
    }

    fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
