// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-view scratch images.
//!
//! Layers that cannot be distorted straight into the target are first
//! squashed into a per-view scratch image. Each view owns a small ring of
//! images; every frame takes one slot per view with [`Scratch::begin_frame`]
//! and hands it back with [`Scratch::end_frame`], which commits slots the
//! frame actually rendered into and discards the rest.
//!
//! ```text
//!   begin_frame ──► ScratchFrame { views[i] = (index, used=false) }
//!                        │
//!                        ▼ recording marks used
//!   end_frame   ──► used ? ring.done(index) : ring.discard(index)
//!                   ScratchFrame cleared
//! ```

use ash::vk;

use crate::error::RenderError;
use crate::gpu::{RenderDevice, ScratchImage};

/// Images per view ring.
pub const SCRATCH_IMAGE_COUNT: usize = 3;

// ---------------------------------------------------------------------------
// Ring
// ---------------------------------------------------------------------------

/// A fixed ring of scratch images with at most one slot handed out.
#[derive(Debug)]
pub struct ScratchRing {
    images: Vec<ScratchImage>,
    next: usize,
    outstanding: Option<u32>,
    last_done: Option<u32>,
}

impl ScratchRing {
    /// Creates [`SCRATCH_IMAGE_COUNT`] images. On failure, the images
    /// already created are destroyed.
    pub fn create(
        gpu: &dyn RenderDevice,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<Self, vk::Result> {
        let mutable = format == vk::Format::R8G8B8A8_SRGB;
        let mut images = Vec::with_capacity(SCRATCH_IMAGE_COUNT);
        for _ in 0..SCRATCH_IMAGE_COUNT {
            match gpu.create_scratch_image(extent, format, mutable) {
                Ok(image) => images.push(image),
                Err(err) => {
                    for image in &images {
                        gpu.destroy_scratch_image(image);
                    }
                    return Err(err);
                }
            }
        }
        Ok(Self {
            images,
            next: 0,
            outstanding: None,
            last_done: None,
        })
    }

    /// Hands out the next slot, round robin.
    ///
    /// # Panics
    ///
    /// Panics if a slot is already handed out.
    pub fn get(&mut self) -> u32 {
        assert!(
            self.outstanding.is_none(),
            "scratch slot {:?} was never returned",
            self.outstanding
        );
        let index = u32::try_from(self.next).unwrap_or(0);
        self.next = (self.next + 1) % self.images.len().max(1);
        self.outstanding = Some(index);
        index
    }

    /// Returns a slot whose content is now valid for readers.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not the slot handed out.
    pub fn done(&mut self, index: u32) {
        assert_eq!(self.outstanding, Some(index), "done on a slot not handed out");
        self.outstanding = None;
        self.last_done = Some(index);
    }

    /// Returns a slot without committing its content.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not the slot handed out.
    pub fn discard(&mut self, index: u32) {
        assert_eq!(self.outstanding, Some(index), "discard on a slot not handed out");
        self.outstanding = None;
    }

    /// The slot currently handed out.
    #[must_use]
    pub fn outstanding(&self) -> Option<u32> {
        self.outstanding
    }

    /// The most recently committed slot.
    #[must_use]
    pub fn last_done(&self) -> Option<u32> {
        self.last_done
    }

    /// Image of a slot.
    #[must_use]
    pub fn image(&self, index: u32) -> Option<&ScratchImage> {
        self.images.get(usize::try_from(index).ok()?)
    }

    /// All images.
    #[must_use]
    pub fn images(&self) -> &[ScratchImage] {
        &self.images
    }

    /// Destroys every image.
    pub fn destroy(&mut self, gpu: &dyn RenderDevice) {
        for image in self.images.drain(..) {
            gpu.destroy_scratch_image(&image);
        }
        self.next = 0;
        self.outstanding = None;
        self.last_done = None;
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ScratchView {
    ring: ScratchRing,
    framebuffers: Vec<vk::Framebuffer>,
}

impl ScratchView {
    fn create(
        gpu: &dyn RenderDevice,
        pass: vk::RenderPass,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<Self, RenderError> {
        let mut ring =
            ScratchRing::create(gpu, extent, format).map_err(RenderError::create("scratch image"))?;
        let mut framebuffers = Vec::with_capacity(ring.images().len());
        for image in ring.images() {
            match gpu.create_framebuffer(pass, image.sample_view, extent) {
                Ok(fb) => framebuffers.push(fb),
                Err(result) => {
                    for fb in framebuffers {
                        gpu.destroy_framebuffer(fb);
                    }
                    ring.destroy(gpu);
                    return Err(RenderError::Create {
                        what: "scratch framebuffer",
                        result,
                    });
                }
            }
        }
        Ok(Self { ring, framebuffers })
    }

    fn destroy(&mut self, gpu: &dyn RenderDevice) {
        for fb in self.framebuffers.drain(..) {
            gpu.destroy_framebuffer(fb);
        }
        self.ring.destroy(gpu);
    }
}

/// Scratch images for every view plus their shared render pass.
#[derive(Debug)]
pub struct Scratch {
    render_pass: Option<vk::RenderPass>,
    views: Vec<ScratchView>,
    extent: vk::Extent2D,
    format: vk::Format,
}

impl Scratch {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            render_pass: None,
            views: Vec::new(),
            extent: vk::Extent2D::default(),
            format: vk::Format::UNDEFINED,
        }
    }

    fn matches(&self, view_count: usize, extent: vk::Extent2D, format: vk::Format) -> bool {
        self.render_pass.is_some()
            && self.views.len() == view_count
            && self.extent == extent
            && self.format == format
    }

    /// Makes sure the pool holds `view_count` rings of `extent` and `format`.
    ///
    /// Does nothing if it already does; otherwise everything is freed and
    /// rebuilt. If any view fails, the whole pool is freed again.
    pub fn ensure(
        &mut self,
        gpu: &dyn RenderDevice,
        view_count: usize,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> Result<(), RenderError> {
        if self.matches(view_count, extent, format) {
            return Ok(());
        }

        self.free(gpu);

        let pass = gpu
            .create_render_pass(format, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .map_err(RenderError::create("scratch render pass"))?;
        self.render_pass = Some(pass);
        self.extent = extent;
        self.format = format;

        for _ in 0..view_count {
            match ScratchView::create(gpu, pass, extent, format) {
                Ok(view) => self.views.push(view),
                Err(err) => {
                    self.free(gpu);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Frees every view, then the render pass.
    pub fn free(&mut self, gpu: &dyn RenderDevice) {
        for view in &mut self.views {
            view.destroy(gpu);
        }
        self.views.clear();
        if let Some(pass) = self.render_pass.take() {
            gpu.destroy_render_pass(pass);
        }
        self.extent = vk::Extent2D::default();
        self.format = vk::Format::UNDEFINED;
    }

    /// Number of views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Image size.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Shared render pass, if allocated.
    #[must_use]
    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass
    }

    /// Image of a view's slot.
    #[must_use]
    pub fn image(&self, view: usize, index: u32) -> Option<&ScratchImage> {
        self.views.get(view)?.ring.image(index)
    }

    /// Framebuffer of a view's slot.
    #[must_use]
    pub fn framebuffer(&self, view: usize, index: u32) -> Option<vk::Framebuffer> {
        let view = self.views.get(view)?;
        view.framebuffers.get(usize::try_from(index).ok()?).copied()
    }

    /// Slot of a view currently handed out to a frame.
    #[must_use]
    pub fn outstanding(&self, view: usize) -> Option<u32> {
        self.views.get(view)?.ring.outstanding()
    }

    /// The most recently committed image of a view.
    #[must_use]
    pub fn latest(&self, view: usize) -> Option<&ScratchImage> {
        let ring = &self.views.get(view)?.ring;
        ring.image(ring.last_done()?)
    }

    /// Takes one slot from every view.
    pub fn begin_frame(&mut self) -> ScratchFrame {
        ScratchFrame {
            views: self
                .views
                .iter_mut()
                .map(|view| ScratchViewState {
                    index: view.ring.get(),
                    used: false,
                })
                .collect(),
        }
    }

    /// Returns every slot taken by `frame`: used slots are committed, the
    /// rest discarded. `frame` is left empty.
    pub fn end_frame(&mut self, frame: &mut ScratchFrame) {
        for (view, state) in self.views.iter_mut().zip(&frame.views) {
            if state.used {
                view.ring.done(state.index);
            } else {
                view.ring.discard(state.index);
            }
        }
        frame.views.clear();
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Per-frame state
// ---------------------------------------------------------------------------

/// Slot taken from one view for the current frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScratchViewState {
    /// Ring index.
    pub index: u32,
    /// Whether the frame rendered into it.
    pub used: bool,
}

/// Slots taken for one frame, one per view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScratchFrame {
    views: Vec<ScratchViewState>,
}

impl ScratchFrame {
    /// Per-view state.
    #[must_use]
    pub fn views(&self) -> &[ScratchViewState] {
        &self.views
    }

    /// Returns `true` once the frame has been returned to the pool.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Marks a view's slot as rendered into.
    pub fn mark_used(&mut self, view: usize) {
        if let Some(state) = self.views.get_mut(view) {
            state.used = true;
        }
    }

    /// Drops every used mark so [`Scratch::end_frame`] discards all slots.
    pub fn abandon(&mut self) {
        for state in &mut self.views {
            state.used = false;
        }
    }
}

/// Read access to the pool plus write access to a frame's used flags.
#[derive(Debug)]
pub struct ScratchAccess<'a> {
    pool: &'a Scratch,
    frame: &'a mut ScratchFrame,
}

impl<'a> ScratchAccess<'a> {
    /// Pairs a pool with one of its frames.
    pub fn new(pool: &'a Scratch, frame: &'a mut ScratchFrame) -> Self {
        Self { pool, frame }
    }

    /// Ring index taken for `view`.
    #[must_use]
    pub fn index(&self, view: usize) -> Option<u32> {
        self.frame.views.get(view).map(|s| s.index)
    }

    /// Image taken for `view`.
    #[must_use]
    pub fn image(&self, view: usize) -> Option<&ScratchImage> {
        self.pool.image(view, self.index(view)?)
    }

    /// Framebuffer taken for `view`.
    #[must_use]
    pub fn framebuffer(&self, view: usize) -> Option<vk::Framebuffer> {
        self.pool.framebuffer(view, self.index(view)?)
    }

    /// Shared render pass.
    #[must_use]
    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.pool.render_pass()
    }

    /// Image size.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.pool.extent()
    }

    /// Marks a view's slot as rendered into.
    pub fn mark_used(&mut self, view: usize) {
        self.frame.mark_used(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::NullDevice;

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 64,
        height: 64,
    };

    fn make_pool(gpu: &NullDevice, views: usize) -> Scratch {
        let mut pool = Scratch::new();
        pool.ensure(gpu, views, EXTENT, vk::Format::R8G8B8A8_SRGB)
            .unwrap();
        pool
    }

    #[test]
    fn ensure_allocates_rings_and_framebuffers() {
        let gpu = NullDevice::new();
        let pool = make_pool(&gpu, 2);
        assert_eq!(pool.view_count(), 2);
        assert_eq!(gpu.live_scratch_images(), 2 * SCRATCH_IMAGE_COUNT);
        assert_eq!(gpu.live_framebuffers(), 2 * SCRATCH_IMAGE_COUNT);
        assert_eq!(gpu.live_render_passes(), 1);
    }

    #[test]
    fn ensure_with_same_config_is_noop() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 2);
        let pass = pool.render_pass();
        pool.ensure(&gpu, 2, EXTENT, vk::Format::R8G8B8A8_SRGB)
            .unwrap();
        assert_eq!(pool.render_pass(), pass, "render pass must be kept");
        assert_eq!(gpu.live_scratch_images(), 2 * SCRATCH_IMAGE_COUNT);
    }

    #[test]
    fn ensure_with_new_extent_rebuilds() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 2);
        let pass = pool.render_pass();
        let bigger = vk::Extent2D {
            width: 128,
            height: 128,
        };
        pool.ensure(&gpu, 2, bigger, vk::Format::R8G8B8A8_SRGB)
            .unwrap();
        assert_ne!(pool.render_pass(), pass, "render pass must be recreated");
        assert_eq!(pool.extent(), bigger);
        assert_eq!(gpu.live_render_passes(), 1, "old render pass freed");
        assert_eq!(gpu.live_scratch_images(), 2 * SCRATCH_IMAGE_COUNT);
    }

    #[test]
    fn srgb_images_are_mutable() {
        let gpu = NullDevice::new();
        let pool = make_pool(&gpu, 1);
        let image = pool.image(0, 0).unwrap();
        assert_ne!(image.sample_view, image.storage_view, "sRGB gets a linear view");

        let mut unorm = Scratch::new();
        unorm
            .ensure(&gpu, 1, EXTENT, vk::Format::R8G8B8A8_UNORM)
            .unwrap();
        let image = unorm.image(0, 0).unwrap();
        assert_eq!(image.sample_view, image.storage_view);
    }

    #[test]
    fn free_releases_everything() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 2);
        pool.free(&gpu);
        assert_eq!(pool.view_count(), 0);
        assert_eq!(gpu.live_scratch_images(), 0);
        assert_eq!(gpu.live_framebuffers(), 0);
        assert_eq!(gpu.live_render_passes(), 0);
    }

    #[test]
    fn frame_resolves_every_view_and_clears() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 2);

        let mut frame = pool.begin_frame();
        assert_eq!(frame.views().len(), 2);
        frame.mark_used(0);
        pool.end_frame(&mut frame);

        assert!(frame.is_empty(), "frame state must be cleared");
        assert_eq!(pool.views[0].ring.last_done(), Some(0), "used slot committed");
        assert_eq!(pool.views[1].ring.last_done(), None, "unused slot discarded");
        assert_eq!(pool.views[0].ring.outstanding(), None);
        assert_eq!(pool.views[1].ring.outstanding(), None);

        // The next frame starts from fresh flags.
        let frame = pool.begin_frame();
        assert!(
            frame.views().iter().all(|v| !v.used),
            "no stale used flags"
        );
        assert_eq!(frame.views()[0].index, 1, "round robin");
    }

    #[test]
    fn latest_follows_committed_slot() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 1);
        assert!(pool.latest(0).is_none());
        let mut frame = pool.begin_frame();
        frame.mark_used(0);
        let expected = *pool.image(0, frame.views()[0].index).unwrap();
        pool.end_frame(&mut frame);
        assert_eq!(pool.latest(0), Some(&expected));
    }

    #[test]
    fn abandoned_frame_keeps_previous_latest() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 1);
        let mut frame = pool.begin_frame();
        frame.mark_used(0);
        pool.end_frame(&mut frame);
        let committed = pool.views[0].ring.last_done();

        let mut frame = pool.begin_frame();
        assert_eq!(pool.outstanding(0), Some(frame.views()[0].index));
        frame.mark_used(0);
        frame.abandon();
        pool.end_frame(&mut frame);

        assert_eq!(pool.outstanding(0), None, "slot returned");
        assert_eq!(
            pool.views[0].ring.last_done(),
            committed,
            "abandoned content is never published"
        );
    }

    #[test]
    fn ring_wraps_around() {
        let gpu = NullDevice::new();
        let mut ring = ScratchRing::create(&gpu, EXTENT, vk::Format::R8G8B8A8_UNORM).unwrap();
        let mut seen = Vec::new();
        for _ in 0..SCRATCH_IMAGE_COUNT + 1 {
            let i = ring.get();
            seen.push(i);
            ring.discard(i);
        }
        assert_eq!(seen, vec![0, 1, 2, 0]);
    }

    #[test]
    #[should_panic(expected = "never returned")]
    fn double_get_panics() {
        let gpu = NullDevice::new();
        let mut ring = ScratchRing::create(&gpu, EXTENT, vk::Format::R8G8B8A8_UNORM).unwrap();
        let _ = ring.get();
        let _ = ring.get();
    }

    #[test]
    fn access_marks_used() {
        let gpu = NullDevice::new();
        let mut pool = make_pool(&gpu, 2);
        let mut frame = pool.begin_frame();
        {
            let mut access = ScratchAccess::new(&pool, &mut frame);
            assert!(access.framebuffer(1).is_some());
            access.mark_used(1);
        }
        assert!(frame.views()[1].used);
        pool.end_frame(&mut frame);
    }
}
