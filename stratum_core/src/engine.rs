// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The composition engine façade and per-frame refresh arguments.
//!
//! [`CompositionEngine`] owns the shared backends (render engine, hardware
//! composer, optional power advisor) and drives all outputs through a frame
//! serially on the composition thread:
//!
//! ```text
//!   for each output: prepare (visibility & coverage, shared latch set)
//!   for each output: latch content state from layer front-ends
//!   for each output: present
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::color::{ColorMode, Dataspace, OutputColorSetting};
use crate::hwc::{HwComposer, HwcDisplayId};
use crate::layer::{Layer, LayerFeSet};
use crate::matrix::Mat4;
use crate::output::Output;
use crate::render::RenderEngine;

/// Receives hints that the upcoming GPU work is unusually expensive.
pub trait PowerAdvisor: Send {
    /// Flags (or clears) expensive rendering for a display.
    fn set_expensive_rendering_expected(&mut self, display: HwcDisplayId, expected: bool);
}

/// Everything the caller passes in to refresh a set of outputs.
pub struct RefreshArgs {
    /// All potentially visible layers, in traversal order back-to-front.
    pub layers: Vec<Arc<Layer>>,
    /// Repaint everything regardless of damage.
    pub repaint_everything: bool,
    /// Output geometry (projections, layer sets) changed this frame.
    pub updating_output_geometry_this_frame: bool,
    /// Layer geometry changed this frame.
    pub updating_geometry_this_frame: bool,
    /// The color management policy for this frame.
    pub output_color_setting: OutputColorSetting,
    /// Overrides the gamut selection when set.
    pub force_output_color_mode: Option<ColorMode>,
    /// Dataspace substituted for color-space-agnostic content.
    pub color_space_agnostic_dataspace: Dataspace,
    /// The color transform to apply, when it changed.
    pub color_transform_matrix: Option<Mat4>,
    /// Debug: force every layer into client composition.
    pub dev_opt_force_client_composition: bool,
    /// Debug: flash dirty regions, pausing this long after each flash.
    pub dev_opt_flash_dirty_regions_delay: Option<Duration>,
}

impl Default for RefreshArgs {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            repaint_everything: false,
            updating_output_geometry_this_frame: true,
            updating_geometry_this_frame: true,
            output_color_setting: OutputColorSetting::Managed,
            force_output_color_mode: None,
            color_space_agnostic_dataspace: Dataspace::Unknown,
            color_transform_matrix: None,
            dev_opt_force_client_composition: false,
            dev_opt_flash_dirty_regions_delay: None,
        }
    }
}

/// Owns the shared composition backends and drives per-frame work.
pub struct CompositionEngine {
    render_engine: Box<dyn RenderEngine>,
    hwc: Arc<dyn HwComposer>,
    power_advisor: Option<Box<dyn PowerAdvisor>>,
}

impl CompositionEngine {
    /// Creates an engine over the given backends.
    #[must_use]
    pub fn new(render_engine: Box<dyn RenderEngine>, hwc: Arc<dyn HwComposer>) -> Self {
        Self {
            render_engine,
            hwc,
            power_advisor: None,
        }
    }

    /// Installs a power advisor.
    pub fn set_power_advisor(&mut self, advisor: Box<dyn PowerAdvisor>) {
        self.power_advisor = Some(advisor);
    }

    /// Returns the render engine.
    #[must_use]
    pub fn render_engine(&self) -> &dyn RenderEngine {
        self.render_engine.as_ref()
    }

    /// Returns the render engine for drawing.
    pub fn render_engine_mut(&mut self) -> &mut dyn RenderEngine {
        self.render_engine.as_mut()
    }

    /// Returns the hardware composer.
    #[must_use]
    pub fn hwc(&self) -> &Arc<dyn HwComposer> {
        &self.hwc
    }

    /// Returns the power advisor, if one is installed.
    pub fn power_advisor_mut(&mut self) -> Option<&mut (dyn PowerAdvisor + '_)> {
        match &mut self.power_advisor {
            Some(advisor) => Some(advisor.as_mut()),
            None => None,
        }
    }

    /// Runs a full composition pass over `outputs`.
    ///
    /// Outputs are processed serially; each layer front-end is latched at
    /// most once even when a layer appears on several outputs.
    pub fn present(&mut self, outputs: &mut [Output], args: &RefreshArgs) {
        let mut latched = LayerFeSet::default();
        for output in outputs.iter_mut() {
            output.prepare(self, args, &mut latched);
        }
        for output in outputs.iter_mut() {
            output.update_layer_state_from_fe(args);
        }
        for output in outputs.iter_mut() {
            output.present(self, args);
        }
    }
}
