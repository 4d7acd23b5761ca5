// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render backend and render surface contracts.
//!
//! Client composition is performed by an external render engine drawing a
//! list of [`LayerSettings`] into a buffer dequeued from the output's
//! [`RenderSurface`]. The core builds the draw list, hands it over, and
//! receives back a ready-fence; it never waits for the GPU itself.

use std::sync::Arc;

use thiserror::Error;

use crate::color::Dataspace;
use crate::fence::Fence;
use crate::matrix::Mat4;
use crate::region::{Rect, Region, Size};
use crate::transform::Orientation;

/// An opaque handle to a graphics buffer.
///
/// Buffers are produced and consumed outside the core; the handle carries
/// identity and size only.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

struct BufferInner {
    id: u64,
    size: Size,
}

impl Buffer {
    /// Creates a buffer handle.
    #[must_use]
    pub fn new(id: u64, size: Size) -> Self {
        Self {
            inner: Arc::new(BufferInner { id, size }),
        }
    }

    /// Returns the buffer's identity.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Returns the buffer's dimensions.
    #[must_use]
    pub fn size(&self) -> Size {
        self.inner.size
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Buffer {}

impl core::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Buffer(#{} {:?})", self.inner.id, self.inner.size)
    }
}

/// Global settings for one client-composition draw call.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplaySettings {
    /// The physical display area being drawn into.
    pub physical_display: Rect,
    /// The clip applied to all layers.
    pub clip: Rect,
    /// The output's global transform.
    pub global_transform: Mat4,
    /// The output's orientation.
    pub orientation: Orientation,
    /// The dataspace of the output buffer, or `Unknown` for non-wide-gamut
    /// displays.
    pub output_dataspace: Dataspace,
    /// Maximum target luminance in nits.
    pub max_luminance: f32,
    /// The color transform to apply, identity when the display applies it.
    pub color_transform: Mat4,
    /// Region the backend must clear before drawing, accumulated from layer
    /// draw requests.
    pub clear_region: Region,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            physical_display: Rect::EMPTY,
            clip: Rect::EMPTY,
            global_transform: Mat4::IDENTITY,
            orientation: Orientation::ROT_0,
            output_dataspace: Dataspace::Unknown,
            max_luminance: 500.0,
            color_transform: Mat4::IDENTITY,
            clear_region: Region::new(),
        }
    }
}

/// Where a layer's pixels come from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelSource {
    /// The buffer to sample, or `None` for a solid color.
    pub buffer: Option<Buffer>,
    /// The solid fill color used when no buffer is set.
    pub solid_color: [f32; 3],
}

/// One draw request handed to the render backend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerSettings {
    /// The layer's footprint in output space.
    pub boundaries: Rect,
    /// Pixel source.
    pub source: PixelSource,
    /// Plane alpha.
    pub alpha: f32,
    /// When set, the layer overwrites rather than blends.
    pub disable_blending: bool,
}

/// Failures reported by the render backend.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The GPU context was lost and must be recreated.
    #[error("the GPU context is lost")]
    ContextLost,
    /// The draw submission was rejected.
    #[error("draw submission failed: {0}")]
    SubmitFailed(&'static str),
}

/// The render backend contract.
///
/// Draws layer lists into buffers; all waiting is expressed through fences.
pub trait RenderEngine: Send {
    /// Returns whether the backend can render protected (DRM) content.
    fn supports_protected_content(&self) -> bool;

    /// Returns whether the backend's current context is protected.
    fn is_protected(&self) -> bool;

    /// Switches the backend between protected and unprotected contexts.
    fn use_protected_context(&mut self, protected: bool);

    /// Draws `layers` into `buffer` once `buffer_fence` signals, returning a
    /// fence that signals when the drawing completes.
    fn draw_layers(
        &mut self,
        display: &DisplaySettings,
        layers: &[LayerSettings],
        buffer: &Buffer,
        use_framebuffer_cache: bool,
        buffer_fence: Fence,
    ) -> Result<Fence, RenderError>;
}

/// The render surface contract: the buffer queue an output presents into.
pub trait RenderSurface: Send {
    /// Resizes the underlying buffers.
    fn set_display_size(&mut self, size: Size);

    /// Returns the current surface size.
    fn size(&self) -> Size;

    /// Sets the dataspace future buffers will be tagged with.
    fn set_buffer_dataspace(&mut self, dataspace: Dataspace);

    /// Signals the start of a frame, and whether it will be recomposed.
    fn begin_frame(&mut self, must_recompose: bool);

    /// Announces which composition strategies the frame will use.
    fn prepare_frame(&mut self, uses_client: bool, uses_device: bool);

    /// Dequeues a buffer for client composition, with its acquire fence.
    ///
    /// Returns `None` when no buffer is available; the caller skips client
    /// composition for the frame.
    fn dequeue_buffer(&mut self) -> Option<(Buffer, Fence)>;

    /// Queues the previously dequeued buffer with its ready-fence.
    fn queue_buffer(&mut self, ready_fence: Fence);

    /// Advances the surface to the next frame.
    fn flip(&mut self);

    /// Notifies the surface that the display has consumed the frame.
    fn on_present_completed(&mut self);

    /// Returns the acquire fence of the current client target buffer.
    fn client_target_acquire_fence(&self) -> Fence;

    /// Switches the surface's buffers between protected and unprotected.
    fn set_protected(&mut self, protected: bool);

    /// Returns whether the surface currently uses protected buffers.
    fn is_protected(&self) -> bool;
}
