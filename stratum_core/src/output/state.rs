// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The mutable per-output composition snapshot.

use crate::color::{ColorMode, Dataspace, RenderIntent};
use crate::matrix::Mat4;
use crate::region::{Rect, Region};
use crate::transform::{Orientation, Transform};

/// All the state involved in composing one output.
///
/// Mutated only through the output's setters or the per-frame pipeline;
/// never shared across threads.
#[derive(Clone, Debug, Default)]
pub struct OutputCompositionState {
    /// Composition is enabled for this output.
    pub is_enabled: bool,
    /// The output shows secure content.
    pub is_secure: bool,
    /// The layer stack this output displays.
    pub layer_stack_id: u32,
    /// The output is an internal display.
    pub layer_stack_internal: bool,
    /// Transform from layer-stack space to output space.
    pub transform: Transform,
    /// The output's orientation.
    pub orientation: Orientation,
    /// The portion of the output the projection maps onto.
    pub frame: Rect,
    /// The output's footprint in layer-stack space.
    pub viewport: Rect,
    /// The scissor applied during client composition.
    pub scissor: Rect,
    /// The output's full bounds in output space.
    pub bounds: Rect,
    /// Scaling is in effect, so drawing needs filtering.
    pub needs_filtering: bool,
    /// Active color mode.
    pub color_mode: ColorMode,
    /// Active dataspace.
    pub dataspace: Dataspace,
    /// Active render intent.
    pub render_intent: RenderIntent,
    /// Dataspace used for color-space-agnostic content.
    pub target_dataspace: Dataspace,
    /// The color transform applied to the whole output.
    pub color_transform_matrix: Mat4,
    /// Pixels that may differ from the last presented frame.
    pub dirty_region: Region,
    /// Pixels not covered by any opaque layer.
    pub undefined_region: Region,
    /// The current frame uses GPU composition.
    pub uses_client_composition: bool,
    /// The current frame uses device composition.
    pub uses_device_composition: bool,
    /// The device asked for the client target to be flipped regardless.
    pub flip_client_target: bool,
    /// The last recomposed frame had at least one visible layer.
    pub last_composition_had_visible_layers: bool,
}
