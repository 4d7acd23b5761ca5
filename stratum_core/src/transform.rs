// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output- and layer-space transforms.
//!
//! A [`Transform`] is an orientation (0/90/180/270 rotation, optionally
//! flipped) plus an integer translation. This covers every transform the
//! display pipeline applies exactly; anything more general (arbitrary
//! rotation, shear) is tagged [`Orientation::ROT_INVALID`], in which case
//! transformed regions degrade to a conservative bounding rectangle and the
//! visibility pass stops treating the layer as rectangle-preserving.

use bitflags::bitflags;

use crate::matrix::Mat4;
use crate::region::{Rect, Region};

bitflags! {
    /// Orientation component of a [`Transform`].
    ///
    /// `ROT_180` is the composition of both flips; `ROT_270` adds a 90°
    /// rotation on top. `ROT_INVALID` marks a transform that cannot be
    /// expressed as an axis-aligned orientation at all.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Orientation: u32 {
        /// Mirror along the vertical axis.
        const FLIP_H = 1 << 0;
        /// Mirror along the horizontal axis.
        const FLIP_V = 1 << 1;
        /// Rotate 90 degrees.
        const ROT_90 = 1 << 2;
        /// Rotate 180 degrees.
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        /// Rotate 270 degrees.
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
        /// Not expressible as an axis-aligned orientation.
        const ROT_INVALID = 1 << 7;
    }
}

impl Orientation {
    /// The identity orientation.
    pub const ROT_0: Self = Self::empty();
}

/// An orientation plus integer translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Transform {
    orientation: Orientation,
    tx: i32,
    ty: i32,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        orientation: Orientation::ROT_0,
        tx: 0,
        ty: 0,
    };

    /// Creates a transform from an orientation and translation.
    #[inline]
    #[must_use]
    pub const fn new(orientation: Orientation, tx: i32, ty: i32) -> Self {
        Self { orientation, tx, ty }
    }

    /// Creates a pure translation.
    #[inline]
    #[must_use]
    pub const fn from_translation(tx: i32, ty: i32) -> Self {
        Self {
            orientation: Orientation::ROT_0,
            tx,
            ty,
        }
    }

    /// Returns the orientation component.
    #[inline]
    #[must_use]
    pub const fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Returns whether this transform maps rectangles to rectangles.
    ///
    /// False only for [`Orientation::ROT_INVALID`] transforms, whose region
    /// mapping is a conservative bounding rectangle.
    #[inline]
    #[must_use]
    pub const fn preserves_rects(&self) -> bool {
        !self.orientation.contains(Orientation::ROT_INVALID)
    }

    /// Maps a point through the orientation and translation.
    #[must_use]
    pub fn map_point(&self, x: i32, y: i32) -> (i32, i32) {
        let (mut x, mut y) = (x, y);
        if self.orientation.contains(Orientation::FLIP_H) {
            x = -x;
        }
        if self.orientation.contains(Orientation::FLIP_V) {
            y = -y;
        }
        if self.orientation.contains(Orientation::ROT_90) {
            let t = x;
            x = -y;
            y = t;
        }
        (x + self.tx, y + self.ty)
    }

    /// Maps a rectangle.
    ///
    /// For rect-preserving transforms this is exact. For `ROT_INVALID`
    /// transforms, only the translation is applied and the result must be
    /// treated as a conservative bound.
    #[must_use]
    pub fn transform_rect(&self, rect: Rect) -> Rect {
        if rect.is_empty() {
            return Rect::EMPTY;
        }
        if !self.preserves_rects() {
            return rect.translated(self.tx, self.ty);
        }
        let (x0, y0) = self.map_point(rect.left, rect.top);
        let (x1, y1) = self.map_point(rect.right, rect.bottom);
        Rect::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Maps a region.
    ///
    /// For `ROT_INVALID` transforms the result is the mapped bounding
    /// rectangle of the input, which is conservative.
    #[must_use]
    pub fn transform_region(&self, region: &Region) -> Region {
        if region.is_empty() {
            return Region::new();
        }
        if !self.preserves_rects() {
            return Region::from_rect(self.transform_rect(region.bounds()));
        }
        let mapped: Vec<Rect> = region.iter().map(|r| self.transform_rect(*r)).collect();
        Region::from_rects(&mapped)
    }

    /// Returns this transform as a 4×4 matrix for the render backend.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "orientation components are in {-1, 0, 1}")]
    pub fn to_matrix(&self) -> Mat4 {
        // Columns are the images of the basis vectors (translation excluded),
        // with the translation in the last column.
        let (ox, oy) = (self.tx, self.ty);
        let (ex, ey) = {
            let (x, y) = self.map_point(1, 0);
            (x - ox, y - oy)
        };
        let (fx, fy) = {
            let (x, y) = self.map_point(0, 1);
            (x - ox, y - oy)
        };
        Mat4::from_cols(
            [ex as f32, ey as f32, 0.0, 0.0],
            [fx as f32, fy as f32, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [self.tx as f32, self.ty as f32, 0.0, 1.0],
        )
    }
}
