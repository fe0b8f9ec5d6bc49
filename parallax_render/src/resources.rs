// Copyright 2026 the Parallax Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-target-image rendering resources.
//!
//! Every target image gets one [`RenderSlot`]: a fence guarding its last
//! submission plus either a framebuffer (graphics path) or its storage view
//! (compute path). The graphics path also owns one render pass shared by all
//! framebuffers. Slots are created and destroyed as a set; the number of
//! fences always equals the number of per-image resources.
//!
//! Teardown order is fixed: per-image resources, then the render pass, then
//! the fences.

use std::time::Duration;

use ash::vk;

use crate::error::RenderError;
use crate::gpu::RenderDevice;
use crate::target::TargetImages;

/// What a slot renders through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotBinding {
    /// A framebuffer over the target image's view.
    Graphics {
        /// Framebuffer.
        framebuffer: vk::Framebuffer,
    },
    /// The target image written by compute shaders.
    Compute {
        /// Target image.
        image: vk::Image,
        /// Storage view of `image`.
        storage_view: vk::ImageView,
    },
}

/// Resources of one target image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSlot {
    /// Signaled when the last submission into this slot finished.
    pub fence: vk::Fence,
    /// Output binding.
    pub binding: SlotBinding,
}

/// The slot set of the current target images.
#[derive(Debug, Default)]
pub struct RenderSlots {
    render_pass: Option<vk::RenderPass>,
    slots: Vec<RenderSlot>,
    acquired: Option<u32>,
    fenced: Option<u32>,
}

impl RenderSlots {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one slot per target image.
    ///
    /// Either every slot is created or, on failure, nothing is left behind.
    pub fn create(
        &mut self,
        gpu: &dyn RenderDevice,
        images: &TargetImages,
        use_compute: bool,
    ) -> Result<(), RenderError> {
        debug_assert!(self.slots.is_empty(), "slots must be closed before creation");
        if images.count() == 0 {
            return Err(RenderError::NoImages);
        }

        if !use_compute {
            let pass = gpu
                .create_render_pass(images.format(), images.final_layout())
                .map_err(RenderError::create("target render pass"))?;
            self.render_pass = Some(pass);
        }

        for image in images.images() {
            if let Err(err) = self.push_slot(gpu, image.image, image.view, images.extent()) {
                self.close(gpu);
                return Err(err);
            }
        }

        tracing::debug!(
            count = self.slots.len(),
            compute = use_compute,
            "created render slots"
        );
        Ok(())
    }

    fn push_slot(
        &mut self,
        gpu: &dyn RenderDevice,
        image: vk::Image,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<(), RenderError> {
        let binding = match self.render_pass {
            Some(pass) => SlotBinding::Graphics {
                framebuffer: gpu
                    .create_framebuffer(pass, view, extent)
                    .map_err(RenderError::create("target framebuffer"))?,
            },
            None => SlotBinding::Compute {
                image,
                storage_view: view,
            },
        };

        // Signaled so the first wait on a fresh slot returns immediately.
        let fence = match gpu.create_fence(true) {
            Ok(fence) => fence,
            Err(result) => {
                if let SlotBinding::Graphics { framebuffer } = binding {
                    gpu.destroy_framebuffer(framebuffer);
                }
                return Err(RenderError::Create {
                    what: "slot fence",
                    result,
                });
            }
        };

        self.slots.push(RenderSlot { fence, binding });
        Ok(())
    }

    /// Destroys every slot and the render pass. The caller must make sure
    /// the GPU no longer uses them.
    pub fn close(&mut self, gpu: &dyn RenderDevice) {
        for slot in &self.slots {
            if let SlotBinding::Graphics { framebuffer } = slot.binding {
                gpu.destroy_framebuffer(framebuffer);
            }
        }
        if let Some(pass) = self.render_pass.take() {
            gpu.destroy_render_pass(pass);
        }
        for slot in self.slots.drain(..) {
            gpu.destroy_fence(slot.fence);
        }
        self.acquired = None;
        self.fenced = None;
    }

    /// Number of slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slots exist.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of fences.
    #[must_use]
    pub fn fence_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of per-image resources (framebuffers or storage bindings).
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.slots.iter().filter(|s| slot_has_resource(s)).count()
    }

    /// Shared render pass of the graphics path.
    #[must_use]
    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass
    }

    /// Slot of a target image.
    #[must_use]
    pub fn slot(&self, index: u32) -> Option<&RenderSlot> {
        self.slots.get(usize::try_from(index).ok()?)
    }

    /// Index of the acquired target image, if one is held.
    #[inline]
    #[must_use]
    pub fn acquired(&self) -> Option<u32> {
        self.acquired
    }

    /// Records an acquired image. Indices without a slot are rejected.
    pub fn set_acquired(&mut self, index: u32) -> Result<(), RenderError> {
        if self.slot(index).is_none() {
            return Err(RenderError::NotAcquired);
        }
        self.acquired = Some(index);
        Ok(())
    }

    /// Releases the acquired image index.
    pub fn take_acquired(&mut self) -> Option<u32> {
        self.acquired.take()
    }

    /// Slot whose fence guards the most recent submission.
    #[inline]
    #[must_use]
    pub fn fenced(&self) -> Option<u32> {
        self.fenced
    }

    /// Records the slot just submitted.
    pub fn set_fenced(&mut self, index: u32) {
        self.fenced = Some(index);
    }

    /// Waits for the most recent submission to finish, if there is one.
    pub fn wait_for_last_fence(&mut self, gpu: &dyn RenderDevice) -> Result<(), vk::Result> {
        let Some(index) = self.fenced.take() else {
            return Ok(());
        };
        let Some(slot) = self.slot(index) else {
            return Ok(());
        };
        gpu.wait_for_fence(slot.fence, Duration::MAX)
    }
}

fn slot_has_resource(slot: &RenderSlot) -> bool {
    match slot.binding {
        SlotBinding::Graphics { framebuffer } => framebuffer != vk::Framebuffer::null(),
        SlotBinding::Compute { storage_view, .. } => storage_view != vk::ImageView::null(),
    }
}
