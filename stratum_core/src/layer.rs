// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Input layers and the layer front-end contract.
//!
//! A [`Layer`] is an application surface as the composition core sees it:
//! a weak handle to the producing front-end plus the front-end state most
//! recently *latched* into the core. Layers may appear on multiple outputs;
//! the latched state is shared, while all per-output derived state lives in
//! [`OutputLayer`](crate::output_layer::OutputLayer).
//!
//! Latching happens at most once per frame per layer across all outputs,
//! tracked by [`LayerFeSet`]. A front-end whose weak handle no longer
//! upgrades is treated as gone and the layer is silently skipped.

use std::sync::{Arc, Weak};

use hashbrown::HashSet;
use parking_lot::{Mutex, MutexGuard};

use crate::color::Dataspace;
use crate::fence::Fence;
use crate::region::{Rect, Region};
use crate::render::LayerSettings;
use crate::transform::Transform;

/// Which part of the front-end state to latch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StateSubset {
    /// Only the geometry needed by the visibility pass.
    BasicGeometry,
    /// Full geometry plus content state.
    GeometryAndContent,
    /// Content state only.
    Content,
}

/// Front-end layer state, latched into the core once per frame.
#[derive(Clone, Debug, Default)]
pub struct LayerFeState {
    /// Whether the layer should be considered at all.
    pub is_visible: bool,
    /// Whether the layer's content is fully opaque.
    pub is_opaque: bool,
    /// Plane alpha. A layer is only treated as opaque when this is 1.
    pub alpha: f32,
    /// Whether the content changed since the last latch.
    pub content_dirty: bool,
    /// The layer's bounds in layer space.
    pub geom_layer_bounds: Rect,
    /// Transform from layer space to layer-stack space.
    pub geom_layer_transform: Transform,
    /// Hint: area of the layer that is completely transparent.
    pub transparent_region_hint: Region,
    /// The dataspace of the layer's content.
    pub dataspace: Dataspace,
    /// The layer can only be composed by the GPU.
    pub force_client_composition: bool,
    /// The layer's content is DRM protected.
    pub has_protected_content: bool,
    /// The layer stack this layer belongs to.
    pub layer_stack_id: u32,
    /// The layer may only appear on internal outputs.
    pub internal_only: bool,
}

/// Settings handed to a front-end when asking it to produce a client
/// composition draw request.
#[derive(Debug)]
pub struct ClientCompositionTargetSettings<'a> {
    /// The clip to apply, in layer-stack space.
    pub clip: Region,
    /// Ignore the layer transform when generating geometry.
    pub use_identity_transform: bool,
    /// The draw needs texture filtering.
    pub needs_filtering: bool,
    /// The output is secure.
    pub is_secure: bool,
    /// The render backend can handle protected content.
    pub supports_protected_content: bool,
    /// Accumulator for any region the front-end wants cleared underneath it.
    pub clear_region: &'a mut Region,
}

/// The layer front-end contract.
///
/// Implemented by the producer-side layer object. The core calls in to
/// latch state, to build client composition requests, and to hand back
/// release fences after present.
pub trait LayerFe: Send + Sync {
    /// Returns a debug name for logging.
    fn name(&self) -> &str;

    /// Populates `state` with the requested subset of front-end state.
    fn latch_composition_state(&self, state: &mut LayerFeState, subset: StateSubset);

    /// Produces the draw request for client-composing this layer, or `None`
    /// when the layer has nothing to draw under the given settings.
    fn prepare_client_composition(
        &self,
        settings: ClientCompositionTargetSettings<'_>,
    ) -> Option<LayerSettings>;

    /// Notifies the front-end that a previously queued buffer may be reused
    /// once `release_fence` signals.
    fn on_layer_displayed(&self, release_fence: Fence);
}

/// An input layer: front-end handle plus latched state.
pub struct Layer {
    fe: Weak<dyn LayerFe>,
    state: Mutex<LayerFeState>,
}

impl Layer {
    /// Creates a layer for the given front-end.
    #[must_use]
    pub fn new(fe: &Arc<dyn LayerFe>) -> Self {
        Self {
            fe: Arc::downgrade(fe),
            state: Mutex::new(LayerFeState::default()),
        }
    }

    /// Upgrades the front-end handle, or `None` if the producer is gone.
    #[must_use]
    pub fn fe(&self) -> Option<Arc<dyn LayerFe>> {
        self.fe.upgrade()
    }

    /// Locks the latched front-end state for reading.
    pub fn fe_state(&self) -> MutexGuard<'_, LayerFeState> {
        self.state.lock()
    }

    /// Locks the latched front-end state for writing (used by latching).
    pub fn fe_state_mut(&self) -> MutexGuard<'_, LayerFeState> {
        self.state.lock()
    }
}

impl core::fmt::Debug for Layer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.fe() {
            Some(fe) => write!(f, "Layer({:?})", fe.name()),
            None => write!(f, "Layer(<gone>)"),
        }
    }
}

/// The set of front-ends already latched this frame, shared across outputs.
#[derive(Default)]
pub struct LayerFeSet {
    seen: HashSet<usize>,
}

impl LayerFeSet {
    /// Records `fe` as latched. Returns `true` if it was not already in the
    /// set (i.e. the caller should perform the latch).
    pub fn insert(&mut self, fe: &Arc<dyn LayerFe>) -> bool {
        self.seen.insert(Arc::as_ptr(fe).cast::<()>() as usize)
    }

    /// Returns whether `fe` has been latched this frame.
    #[must_use]
    pub fn contains(&self, fe: &Arc<dyn LayerFe>) -> bool {
        self.seen.contains(&(Arc::as_ptr(fe).cast::<()>() as usize))
    }
}
