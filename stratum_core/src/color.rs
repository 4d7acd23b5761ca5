// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color management types and the display color profile contract.
//!
//! The composition core does no pixel math; it only *selects* a color
//! profile per frame (see the color-profile step of the per-frame driver)
//! and hands the chosen `(mode, dataspace, intent)` triple to the render
//! surface and hardware composer. The [`DisplayColorProfile`] trait is the
//! narrow window onto a display's actual color capabilities.

use crate::output_layer::OutputLayer;

/// A dataspace: the color space + transfer function tag a buffer carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dataspace {
    /// No dataspace information.
    #[default]
    Unknown,
    /// sRGB gamma, BT.709 primaries.
    V0Srgb,
    /// Linear sRGB.
    V0SrgbLinear,
    /// Extended sRGB (scRGB), gamma transfer.
    V0Scrgb,
    /// Extended sRGB (scRGB), linear transfer.
    V0ScrgbLinear,
    /// Display P3.
    DisplayP3,
    /// BT.2020 primaries.
    Bt2020,
    /// BT.2020, ITU range.
    Bt2020Itu,
    /// Display BT.2020.
    DisplayBt2020,
    /// BT.2020 with the PQ (SMPTE 2084) transfer function.
    Bt2020Pq,
    /// BT.2020 ITU range with the PQ transfer function.
    Bt2020ItuPq,
    /// BT.2020 with the HLG transfer function.
    Bt2020Hlg,
    /// BT.2020 ITU range with the HLG transfer function.
    Bt2020ItuHlg,
}

impl Dataspace {
    /// Returns whether this dataspace carries an HDR transfer function.
    #[must_use]
    pub const fn is_hdr(self) -> bool {
        matches!(
            self,
            Self::Bt2020Pq | Self::Bt2020ItuPq | Self::Bt2020Hlg | Self::Bt2020ItuHlg
        )
    }
}

/// A display color mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorMode {
    /// No color management; buffers are scanned out as-is.
    #[default]
    Native,
    /// sRGB color mode.
    Srgb,
    /// Display P3 color mode.
    DisplayP3,
    /// BT.2020 color mode.
    DisplayBt2020,
}

/// The rendering intent used when mapping content into the display gamut.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderIntent {
    /// Colors outside the display gamut are clipped.
    #[default]
    Colorimetric,
    /// Vendor-defined color enhancement.
    Enhance,
    /// HDR tone mapping, colorimetric for in-gamut colors.
    ToneMapColorimetric,
    /// HDR tone mapping plus enhancement.
    ToneMapEnhance,
    /// A vendor-defined intent, passed through untouched.
    Vendor(i32),
}

/// The per-frame color management policy requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputColorSetting {
    /// No color management.
    Unmanaged,
    /// Managed color with colorimetric intent.
    #[default]
    Managed,
    /// Managed color with vendor enhancement.
    Enhanced,
    /// A vendor-defined setting, mapped straight to a vendor intent.
    Vendor(i32),
}

/// The resolved color profile applied to an output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorProfile {
    /// Selected color mode.
    pub mode: ColorMode,
    /// Selected dataspace.
    pub dataspace: Dataspace,
    /// Selected render intent.
    pub render_intent: RenderIntent,
    /// Dataspace to substitute for color-space-agnostic content.
    pub color_space_agnostic_dataspace: Dataspace,
}

/// HDR-related display capabilities.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HdrCapabilities {
    /// The luminance the compositor should target, in nits.
    pub desired_max_luminance: f32,
}

impl Default for HdrCapabilities {
    fn default() -> Self {
        // SDR displays top out around 500 nits.
        Self {
            desired_max_luminance: 500.0,
        }
    }
}

/// The color capabilities of one display.
///
/// Implemented outside the core (EDID parsing, HWC capability queries);
/// the composition pipeline consumes it when picking a profile.
pub trait DisplayColorProfile: Send {
    /// Returns whether the display supports a wide color gamut.
    fn has_wide_color_gamut(&self) -> bool;

    /// Returns the display's HDR capabilities.
    fn hdr_capabilities(&self) -> HdrCapabilities;

    /// Returns whether the display claims legacy (pre-modern-HWC) support
    /// for the given HDR dataspace.
    fn has_legacy_hdr_support(&self, dataspace: Dataspace) -> bool;

    /// Resolves the best `(dataspace, mode, intent)` the display can do for
    /// a candidate dataspace and intent.
    fn best_color_mode(
        &self,
        dataspace: Dataspace,
        intent: RenderIntent,
    ) -> (Dataspace, ColorMode, RenderIntent);

    /// Returns the dataspace that color-space-agnostic content should be
    /// treated as under the given profile.
    fn target_dataspace(
        &self,
        mode: ColorMode,
        dataspace: Dataspace,
        color_space_agnostic_dataspace: Dataspace,
    ) -> Dataspace;
}

/// The widest-gamut scan result over an output's layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BestDataspace {
    /// Widest SDR gamut present.
    pub best: Dataspace,
    /// HDR dataspace present, if any. PQ wins over HLG when mixed.
    pub hdr: Dataspace,
    /// Whether any HDR layer is forced into client composition.
    pub hdr_in_client_composition: bool,
}

/// Scans layers back-to-front for the widest gamut and HDR content.
pub(crate) fn best_dataspace(layers: &[OutputLayer]) -> BestDataspace {
    let mut out = BestDataspace {
        best: Dataspace::V0Srgb,
        hdr: Dataspace::Unknown,
        hdr_in_client_composition: false,
    };
    for layer in layers {
        let fe_state = layer.layer().fe_state();
        match fe_state.dataspace {
            Dataspace::V0Scrgb
            | Dataspace::V0ScrgbLinear
            | Dataspace::Bt2020
            | Dataspace::Bt2020Itu
            | Dataspace::DisplayBt2020 => out.best = Dataspace::DisplayBt2020,
            Dataspace::DisplayP3 => {
                if out.best == Dataspace::V0Srgb {
                    out.best = Dataspace::DisplayP3;
                }
            }
            Dataspace::Bt2020Pq | Dataspace::Bt2020ItuPq => {
                out.best = Dataspace::DisplayBt2020;
                out.hdr = Dataspace::Bt2020Pq;
                if fe_state.force_client_composition {
                    out.hdr_in_client_composition = true;
                }
            }
            Dataspace::Bt2020Hlg | Dataspace::Bt2020ItuHlg => {
                out.best = Dataspace::DisplayBt2020;
                if out.hdr != Dataspace::Bt2020Pq {
                    out.hdr = Dataspace::Bt2020Hlg;
                }
                if fe_state.force_client_composition {
                    out.hdr_in_client_composition = true;
                }
            }
            _ => {}
        }
    }
    out
}
