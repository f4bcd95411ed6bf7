// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orthographic frustum fitting for the chart viewport.

use nalgebra::Point3;

use crate::bounds::Aabb;

/// Tunables for [`fit_orthographic`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustumParams {
    /// Padding added on every side of the content, in scene units
    pub margin: f64,
    pub near: f64,
    pub far: f64,
    /// Eye offset along +Z from the content center
    pub camera_distance: f64,
}

impl Default for FrustumParams {
    fn default() -> Self {
        Self {
            margin: 20.0,
            near: 0.1,
            far: 5000.0,
            camera_distance: 1000.0,
        }
    }
}

/// Orthographic camera volume, planes relative to `eye`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrthoFrustum {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
    pub near: f64,
    pub far: f64,
    pub eye: Point3<f64>,
    pub target: Point3<f64>,
}

impl OrthoFrustum {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Fit a frustum around `bounds` plus `params.margin`, widening whichever
/// axis is needed so the frustum aspect equals `width / height`.
///
/// An empty box yields a pixel-sized frustum centered on the origin.
pub fn fit_orthographic(bounds: &Aabb, width: f64, height: f64, params: &FrustumParams) -> OrthoFrustum {
    let Some(center) = bounds.center() else {
        return OrthoFrustum {
            left: -width / 2.0,
            right: width / 2.0,
            top: height / 2.0,
            bottom: -height / 2.0,
            near: params.near,
            far: params.far,
            eye: Point3::new(0.0, 0.0, params.camera_distance),
            target: Point3::origin(),
        };
    };

    let size = bounds.size();
    let mut view_w = size.x + params.margin * 2.0;
    let mut view_h = size.y + params.margin * 2.0;
    let aspect = width / height.max(1.0);
    let content_aspect = view_w / view_h.max(1e-6);
    if aspect > content_aspect {
        view_w = view_h * aspect;
    } else {
        view_h = view_w / aspect.max(1e-6);
    }

    OrthoFrustum {
        left: -view_w / 2.0,
        right: view_w / 2.0,
        top: view_h / 2.0,
        bottom: -view_h / 2.0,
        near: params.near,
        far: params.far,
        eye: Point3::new(center.x, center.y, params.camera_distance),
        target: Point3::new(center.x, center.y, 0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wide_viewport_expands_width() {
        let b = Aabb::new(Point3::new(-50.0, -10.0, 0.0), Point3::new(50.0, 30.0, 5.0));
        let f = fit_orthographic(&b, 1600.0, 400.0, &FrustumParams::default());
        // content 140 x 80, aspect 4 -> width 320
        assert_relative_eq!(f.height(), 80.0);
        assert_relative_eq!(f.width(), 320.0);
        assert_relative_eq!(f.eye.y, 10.0);
        assert_relative_eq!(f.eye.z, 1000.0);
    }

    #[test]
    fn tall_viewport_expands_height() {
        let b = Aabb::new(Point3::new(-50.0, -10.0, 0.0), Point3::new(50.0, 30.0, 5.0));
        let f = fit_orthographic(&b, 400.0, 800.0, &FrustumParams::default());
        assert_relative_eq!(f.width(), 140.0);
        assert_relative_eq!(f.height(), 280.0);
    }

    #[test]
    fn empty_bounds_fall_back_to_pixel_frustum() {
        let f = fit_orthographic(&Aabb::empty(), 200.0, 100.0, &FrustumParams::default());
        assert_relative_eq!(f.right, 100.0);
        assert_relative_eq!(f.top, 50.0);
        assert_eq!(f.target, Point3::origin());
    }
}
