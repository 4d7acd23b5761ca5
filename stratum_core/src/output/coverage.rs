// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visibility and coverage computation.
//!
//! Once per frame the output walks the input layer list *front-to-back*,
//! accumulating which pixels are already covered and which are opaquely
//! covered. Each layer's visible, covered, transparent and opaque regions
//! fall out of that walk, along with the layer's contribution to the frame
//! dirty region. Layers that end up fully occluded (or fully transparent,
//! or outside the output) produce no output layer at all.
//!
//! The walk emits surviving output layers front-to-back; the caller
//! reverses the list to restore back-to-front order and assigns compact z
//! values.

use tracing::warn;

use crate::engine::{CompositionEngine, RefreshArgs};
use crate::layer::{Layer, LayerFeSet, StateSubset};
use crate::output_layer::OutputLayer;
use crate::region::Region;
use crate::transform::Orientation;

use super::Output;

/// Incremental coverage accumulators for one visibility pass.
pub(super) struct CoverageState<'a> {
    /// Front-ends latched so far this frame, shared across outputs.
    pub latched: &'a mut LayerFeSet,
    /// Region covered by any layer above the current one.
    pub above_covered: Region,
    /// Region opaquely covered by layers above the current one.
    pub above_opaque: Region,
    /// Accumulated dirty region in layer-stack space.
    pub dirty: Region,
}

impl Output {
    /// Rebuilds the ordered output-layer list from the input layers.
    ///
    /// No-op unless the output is enabled and the frame updates output
    /// geometry.
    pub(super) fn rebuild_layer_stacks(
        &mut self,
        engine: &CompositionEngine,
        args: &RefreshArgs,
        latched: &mut LayerFeSet,
    ) {
        if !self.state.is_enabled || !args.updating_output_geometry_this_frame {
            return;
        }

        let mut coverage = CoverageState {
            latched,
            above_covered: Region::new(),
            above_opaque: Region::new(),
            dirty: Region::new(),
        };
        self.collect_visible_layers(engine, args, &mut coverage);

        let mut undefined = Region::from_rect(self.state.bounds);
        undefined.subtract_self(&self.state.transform.transform_region(&coverage.above_opaque));
        self.state.undefined_region = undefined;
        self.state.dirty_region.or_self(&coverage.dirty);
    }

    /// Walks the input layers front-to-back and installs the surviving
    /// output layers back-to-front with compact z values.
    fn collect_visible_layers(
        &mut self,
        engine: &CompositionEngine,
        args: &RefreshArgs,
        coverage: &mut CoverageState<'_>,
    ) {
        let mut previous = core::mem::take(&mut self.layers);
        let mut pending: Vec<OutputLayer> = Vec::with_capacity(args.layers.len());

        for layer in args.layers.iter().rev() {
            if let Some(output_layer) =
                self.output_layer_if_visible(engine, layer, &mut previous, coverage)
            {
                pending.push(output_layer);
            }
        }

        pending.reverse();
        for (z, output_layer) in pending.iter_mut().enumerate() {
            #[expect(clippy::cast_possible_truncation, reason = "layer counts fit in u32")]
            {
                output_layer.state_mut().z = z as u32;
            }
        }

        // Layers present last frame but not reused lose their device layer
        // and get the present fence through the released set. The area they
        // exposed needs repainting.
        self.released.clear();
        for old in previous {
            coverage.dirty.or_self(&old.state().visible_region);
            self.released.push(std::sync::Arc::downgrade(old.fe()));
            if let (Some(hwc_display), Some(hwc_layer)) = (self.hwc_display, old.hwc_layer()) {
                if let Err(e) = engine.hwc().destroy_layer(hwc_display, hwc_layer) {
                    warn!(output = %self.name, error = %e, "failed to destroy HWC layer");
                }
            }
        }

        self.layers = pending;
    }

    /// Processes one layer of the front-to-back walk.
    ///
    /// Returns the (reused or new) output layer when the layer remains
    /// visible on this output, updating the coverage accumulators either
    /// way.
    fn output_layer_if_visible(
        &self,
        engine: &CompositionEngine,
        layer: &std::sync::Arc<Layer>,
        previous: &mut Vec<OutputLayer>,
        coverage: &mut CoverageState<'_>,
    ) -> Option<OutputLayer> {
        // A front-end that no longer upgrades means the producer is gone.
        let fe = layer.fe()?;

        // Snapshot basic geometry once per frame across all outputs.
        if coverage.latched.insert(&fe) {
            fe.latch_composition_state(&mut layer.fe_state_mut(), StateSubset::BasicGeometry);
        }
        let fe_state = layer.fe_state().clone();

        if !self.belongs_in_output(fe_state.layer_stack_id, fe_state.internal_only) {
            return None;
        }
        if !fe_state.is_visible {
            return None;
        }

        let tr = fe_state.geom_layer_transform;

        // The layer's footprint in layer-stack space, clipped to the
        // output's viewport.
        let mut visible = Region::from_rect(tr.transform_rect(fe_state.geom_layer_bounds));
        visible.and_self(&Region::from_rect(self.state.viewport));
        if visible.is_empty() {
            return None;
        }

        let opaque_layer = fe_state.is_opaque && fe_state.alpha >= 1.0;

        // The transparent hint only holds up under rect-preserving
        // transforms.
        let mut transparent = Region::new();
        if !opaque_layer && tr.preserves_rects() {
            transparent = tr.transform_region(&fe_state.transparent_region_hint);
        }

        // An opaque footprint only counts when the orientation is one of
        // the exact 0/90/180/270 (possibly flipped) cases; anything else
        // has edge error and is treated as translucent.
        let mut opaque = Region::new();
        if opaque_layer && !tr.orientation().contains(Orientation::ROT_INVALID) {
            opaque = visible.clone();
        }

        let covered = coverage.above_covered.intersect(&visible);
        coverage.above_covered.or_self(&visible);

        visible.subtract_self(&coverage.above_opaque);
        if visible.is_empty() {
            return None;
        }

        // Coverage as previously displayed, for the dirty computation.
        let previous_layer = take_output_layer_for(previous, layer);
        let (old_visible, old_covered) = previous_layer
            .as_ref()
            .map(|p| {
                (
                    p.state().visible_region.clone(),
                    p.state().covered_region.clone(),
                )
            })
            .unwrap_or_default();

        let mut dirty;
        if fe_state.content_dirty {
            dirty = visible.union(&old_visible);
        } else {
            // Exposed area has two parts: what is visible now and was
            // covered before (conservative), and what is exposed now but
            // was not exposed before (resize).
            let new_exposed = visible.subtract(&covered);
            let old_exposed = old_visible.subtract(&old_covered);
            dirty = visible
                .intersect(&old_covered)
                .union(&new_exposed.subtract(&old_exposed));
        }
        dirty.subtract_self(&coverage.above_opaque);
        coverage.dirty.or_self(&dirty);

        coverage.above_opaque.or_self(&opaque);

        let visible_non_transparent = visible.subtract(&transparent);

        // Final check: does anything actually land on the output?
        let mut draw_region = self.state.transform.transform_region(&visible_non_transparent);
        draw_region.and_self(&Region::from_rect(self.state.bounds));
        if draw_region.is_empty() {
            return None;
        }

        let mut result = match previous_layer {
            Some(reused) => reused,
            None => self.create_output_layer(engine, layer.clone(), fe),
        };

        let output_space_visible = self
            .state
            .transform
            .transform_region(&visible.intersect(&Region::from_rect(self.state.viewport)));

        let state = result.state_mut();
        state.visible_region = visible;
        state.visible_non_transparent_region = visible_non_transparent;
        state.covered_region = covered;
        state.output_space_visible_region = output_space_visible;

        Some(result)
    }

    /// Creates a fresh output layer, binding a hardware-composer layer on
    /// device-backed outputs.
    fn create_output_layer(
        &self,
        engine: &CompositionEngine,
        layer: std::sync::Arc<Layer>,
        fe: std::sync::Arc<dyn crate::layer::LayerFe>,
    ) -> OutputLayer {
        let mut output_layer = OutputLayer::new(layer, fe);
        if let Some(hwc_display) = self.hwc_display {
            match engine.hwc().create_layer(hwc_display) {
                Ok(hwc_layer) => output_layer.set_hwc_layer(hwc_layer),
                Err(e) => {
                    warn!(
                        output = %self.name,
                        error = %e,
                        "failed to create HWC layer, falling back to client composition"
                    );
                }
            }
        }
        output_layer
    }
}

/// Takes ownership of the previous frame's output layer for `layer`, if one
/// exists.
fn take_output_layer_for(
    previous: &mut Vec<OutputLayer>,
    layer: &std::sync::Arc<Layer>,
) -> Option<OutputLayer> {
    let index = previous
        .iter()
        .position(|ol| std::sync::Arc::ptr_eq(ol.layer(), layer))?;
    Some(previous.swap_remove(index))
}
