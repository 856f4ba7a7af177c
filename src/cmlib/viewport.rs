//! Mapping between image space and canvas space. Canvas space is measured in device
//! pixels of the backing store, i.e., css pixels times the device pixel ratio.
//!
//! `canvas = image * k + pan`
use crate::domain::{PtF, ShapeF, TPtF};
use serde::{Deserialize, Serialize};
use tracing::debug;

const MIN_FIT_ZOOM: TPtF = 1e-4;

/// Border plus padding of the canvas element in css pixels.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct Insets {
    pub left: TPtF,
    pub top: TPtF,
    pub right: TPtF,
    pub bottom: TPtF,
}
impl Insets {
    pub fn uniform(v: TPtF) -> Self {
        Insets {
            left: v,
            top: v,
            right: v,
            bottom: v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomLimits {
    pub min: TPtF,
    pub max: TPtF,
}
impl Default for ZoomLimits {
    fn default() -> Self {
        ZoomLimits {
            min: 0.05,
            max: 40.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    k: TPtF,
    pan: PtF,
    dpr: TPtF,
    limits: ZoomLimits,
    image_shape: ShapeF,
    css_content: ShapeF,
    canvas_shape: ShapeF,
}
impl Viewport {
    pub fn new(image_shape: ShapeF, limits: ZoomLimits) -> Self {
        let limits = if limits.min > 0.0 && limits.min <= limits.max {
            limits
        } else {
            ZoomLimits::default()
        };
        Viewport {
            k: 1.0,
            pan: PtF::default(),
            dpr: 1.0,
            limits,
            image_shape: image_shape.at_least_one(),
            css_content: ShapeF::new(1.0, 1.0),
            canvas_shape: ShapeF::new(1.0, 1.0),
        }
    }
    pub fn k(&self) -> TPtF {
        self.k
    }
    pub fn pan(&self) -> PtF {
        self.pan
    }
    pub fn dpr(&self) -> TPtF {
        self.dpr
    }
    pub fn limits(&self) -> ZoomLimits {
        self.limits
    }
    pub fn image_shape(&self) -> ShapeF {
        self.image_shape
    }
    /// Size of the backing store in device pixels.
    pub fn canvas_shape(&self) -> ShapeF {
        self.canvas_shape
    }
    pub fn zoom_percent(&self) -> TPtF {
        self.k * 100.0
    }

    /// Recomputes the backing store from the outer css box of the canvas. Returns `true` if
    /// the backing store changed.
    pub fn resize(&mut self, outer_css: ShapeF, insets: Insets, dpr: TPtF) -> bool {
        let dpr = if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 };
        let content = ShapeF::new(
            outer_css.w - insets.left - insets.right,
            outer_css.h - insets.top - insets.bottom,
        )
        .at_least_one();
        let canvas = ShapeF::new((content.w * dpr).round(), (content.h * dpr).round()).at_least_one();
        let changed = canvas != self.canvas_shape || content != self.css_content || dpr != self.dpr;
        if changed {
            debug!("backing store {canvas:?} from css content {content:?} at dpr {dpr}");
        }
        self.dpr = dpr;
        self.css_content = content;
        self.canvas_shape = canvas;
        changed
    }

    /// Maps a position relative to the outer box of the canvas element in css pixels to
    /// canvas space.
    pub fn event_to_canvas(&self, css_pos: PtF, insets: Insets) -> PtF {
        let sx = self.canvas_shape.w / self.css_content.w.max(1.0);
        let sy = self.canvas_shape.h / self.css_content.h.max(1.0);
        PtF::new((css_pos.x - insets.left) * sx, (css_pos.y - insets.top) * sy)
    }
    pub fn image_to_canvas(&self, p: PtF) -> PtF {
        p * self.k + self.pan
    }
    pub fn canvas_to_image(&self, p: PtF) -> PtF {
        (p - self.pan) / self.k
    }
    /// Converts a length in screen pixels to image units.
    pub fn px_to_img(&self, px: TPtF) -> TPtF {
        px / self.k
    }
    /// Image point under the center of the canvas.
    pub fn center_anchor(&self) -> PtF {
        self.canvas_to_image(PtF::new(
            self.canvas_shape.w * 0.5,
            self.canvas_shape.h * 0.5,
        ))
    }

    /// Sets the zoom factor such that `anchor` given in image space keeps its canvas
    /// position. Non-finite factors are ignored.
    pub fn set_zoom_around(&mut self, new_k: TPtF, anchor: PtF) {
        if !new_k.is_finite() || !anchor.is_finite() {
            return;
        }
        let k = new_k.clamp(self.limits.min, self.limits.max);
        let c_before = self.image_to_canvas(anchor);
        self.k = k;
        self.pan = c_before - anchor * k;
    }
    pub fn zoom_by(&mut self, factor: TPtF, anchor: PtF) {
        self.set_zoom_around(self.k * factor, anchor);
    }
    pub fn pan_by_canvas_delta(&mut self, d: PtF) {
        if d.is_finite() {
            self.pan = self.pan + d;
        }
    }
    fn center_with(&mut self, k: TPtF) {
        self.k = k;
        self.pan = PtF::new(
            (self.canvas_shape.w - self.image_shape.w * k) * 0.5,
            (self.canvas_shape.h - self.image_shape.h * k) * 0.5,
        );
    }
    /// Whole image visible and centered. The factor is only bounded from below by a tiny
    /// positive value such that huge images still fit.
    pub fn fit(&mut self) {
        let kx = self.canvas_shape.w / self.image_shape.w;
        let ky = self.canvas_shape.h / self.image_shape.h;
        self.center_with(kx.min(ky).max(MIN_FIT_ZOOM));
    }
    pub fn fit_height(&mut self) {
        let k = (self.canvas_shape.h / self.image_shape.h).max(MIN_FIT_ZOOM);
        self.center_with(k);
    }
    pub fn reset(&mut self) {
        self.k = 1.0;
        self.pan = PtF::default();
    }
}

#[cfg(test)]
use crate::domain::floats_close;
#[cfg(test)]
fn test_viewport() -> Viewport {
    let mut vp = Viewport::new(ShapeF::new(400.0, 300.0), ZoomLimits::default());
    vp.resize(ShapeF::new(800.0, 450.0), Insets::default(), 1.0);
    vp
}

#[test]
fn test_roundtrip() {
    let mut vp = test_viewport();
    vp.set_zoom_around(2.7, PtF::new(13.0, 17.0));
    vp.pan_by_canvas_delta(PtF::new(-33.3, 12.5));
    for p in [PtF::new(0.0, 0.0), PtF::new(399.5, 12.25), PtF::new(-5.0, 1e4)] {
        let back = vp.canvas_to_image(vp.image_to_canvas(p));
        assert!((back.x - p.x).abs() < 1e-9 && (back.y - p.y).abs() < 1e-9);
    }
}

#[test]
fn test_anchor_pinned() {
    let mut vp = test_viewport();
    vp.pan_by_canvas_delta(PtF::new(21.0, -7.0));
    let anchor = PtF::new(100.0, 50.0);
    let before = vp.image_to_canvas(anchor);
    for k in [0.3, 5.5, 1000.0, 1e-6] {
        vp.set_zoom_around(k, anchor);
        let after = vp.image_to_canvas(anchor);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);
    }
    // clamped
    assert!(floats_close(vp.k(), ZoomLimits::default().min));
    vp.set_zoom_around(f64::NAN, anchor);
    vp.set_zoom_around(f64::INFINITY, anchor);
    assert!(floats_close(vp.k(), ZoomLimits::default().min));
}

#[test]
fn test_fit() {
    let mut vp = test_viewport();
    vp.fit();
    let w = 400.0 * vp.k();
    let h = 300.0 * vp.k();
    assert!(w <= 800.0 + 1e-9 && h <= 450.0 + 1e-9);
    assert!(floats_close(w, 800.0) || floats_close(h, 450.0));
    let tl = vp.image_to_canvas(PtF::new(0.0, 0.0));
    assert!(floats_close(tl.x, (800.0 - w) * 0.5));
    assert!(floats_close(tl.y, 0.0));

    let mut huge = Viewport::new(ShapeF::new(1e6, 1e6), ZoomLimits::default());
    huge.resize(ShapeF::new(100.0, 100.0), Insets::default(), 1.0);
    huge.fit();
    assert!(floats_close(huge.k(), 1e-4));

    vp.fit_height();
    assert!(floats_close(vp.k(), 1.5));
    vp.reset();
    assert!(floats_close(vp.k(), 1.0));
    assert_eq!(vp.pan(), PtF::default());
}

#[test]
fn test_resize_and_events() {
    let mut vp = Viewport::new(ShapeF::new(0.0, 0.0), ZoomLimits::default());
    assert_eq!(vp.image_shape(), ShapeF::new(1.0, 1.0));
    assert!(vp.resize(ShapeF::new(104.0, 54.0), Insets::uniform(2.0), 2.0));
    assert_eq!(vp.canvas_shape(), ShapeF::new(200.0, 100.0));
    assert!(!vp.resize(ShapeF::new(104.0, 54.0), Insets::uniform(2.0), 2.0));
    let c = vp.event_to_canvas(PtF::new(12.0, 7.0), Insets::uniform(2.0));
    assert_eq!(c, PtF::new(20.0, 10.0));
    vp.resize(ShapeF::new(0.0, -3.0), Insets::default(), 0.0);
    assert_eq!(vp.canvas_shape(), ShapeF::new(1.0, 1.0));
    assert!(floats_close(vp.dpr(), 1.0));
}

#[test]
fn test_center_and_px() {
    let mut vp = test_viewport();
    vp.set_zoom_around(4.0, PtF::new(0.0, 0.0));
    assert!(floats_close(vp.px_to_img(18.0), 4.5));
    let c = vp.center_anchor();
    assert!(floats_close(c.x, 100.0) && floats_close(c.y, 56.25));
    assert!(floats_close(vp.zoom_percent(), 400.0));
}
