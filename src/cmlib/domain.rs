//! Geometry in image space, i.e., in pixel coordinates of the original image.
use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

pub type TPtF = f64;

pub fn floats_close(x: TPtF, y: TPtF) -> bool {
    (x - y).abs() < 1e-10
}

/// Serialized as `[x, y]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(from = "[TPtF; 2]", into = "[TPtF; 2]")]
pub struct PtF {
    pub x: TPtF,
    pub y: TPtF,
}
impl PtF {
    pub const fn new(x: TPtF, y: TPtF) -> Self {
        Self { x, y }
    }
    pub fn len_square(&self) -> TPtF {
        self.x * self.x + self.y * self.y
    }
    pub fn len(&self) -> TPtF {
        self.len_square().sqrt()
    }
    pub fn dist_square(&self, other: &Self) -> TPtF {
        (*self - *other).len_square()
    }
    pub fn dist(&self, other: &Self) -> TPtF {
        self.dist_square(other).sqrt()
    }
    pub fn dot(&self, rhs: &Self) -> TPtF {
        self.x * rhs.x + self.y * rhs.y
    }
    pub fn midpoint(&self, other: &Self) -> Self {
        (*self + *other) * 0.5
    }
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
    pub fn is_close_to(&self, other: Self) -> bool {
        floats_close(self.x, other.x) && floats_close(self.y, other.y)
    }
}
impl From<[TPtF; 2]> for PtF {
    fn from(value: [TPtF; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}
impl From<PtF> for [TPtF; 2] {
    fn from(p: PtF) -> Self {
        [p.x, p.y]
    }
}
impl From<(TPtF, TPtF)> for PtF {
    fn from(value: (TPtF, TPtF)) -> Self {
        Self::new(value.0, value.1)
    }
}
impl Add for PtF {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}
impl Sub for PtF {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
impl Mul<TPtF> for PtF {
    type Output = Self;
    fn mul(self, rhs: TPtF) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}
impl Div<TPtF> for PtF {
    type Output = Self;
    fn div(self, rhs: TPtF) -> Self::Output {
        Self::new(self.x / rhs, self.y / rhs)
    }
}
impl Neg for PtF {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Width and height, e.g., of an image or of a canvas.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
pub struct ShapeF {
    pub w: TPtF,
    pub h: TPtF,
}
impl ShapeF {
    pub const fn new(w: TPtF, h: TPtF) -> Self {
        Self { w, h }
    }
    /// Zero, negative or non-finite extents become 1.
    pub fn at_least_one(self) -> Self {
        let fix = |v: TPtF| if v.is_finite() { v.max(1.0) } else { 1.0 };
        Self::new(fix(self.w), fix(self.h))
    }
}

/// Distance between a line segment and a point. Zero-length segments degrade to point
/// distance.
#[must_use]
pub fn dist_lineseg_point(ls: &(PtF, PtF), p: PtF) -> TPtF {
    let (p1, p2) = *ls;
    let d = p2 - p1;
    let len_sq = d.len_square();
    if len_sq <= 0.0 {
        return p.dist(&p1);
    }
    let t = ((p - p1).dot(&d) / len_sq).clamp(0.0, 1.0);
    let proj = p1 + d * t;
    p.dist(&proj)
}

/// Angle at vertex `v` between the rays towards `a` and `b` in degrees within `[0, 180]`.
#[must_use]
pub fn angle_abc(a: PtF, v: PtF, b: PtF) -> TPtF {
    let alpha = (a.y - v.y).atan2(a.x - v.x);
    let beta = (b.y - v.y).atan2(b.x - v.x);
    let deg = (alpha - beta).abs().to_degrees();
    if deg > 180.0 { 360.0 - deg } else { deg }
}

pub fn centroid(points: &[PtF]) -> Option<PtF> {
    if points.is_empty() {
        None
    } else {
        let sum = points.iter().fold(PtF::default(), |acc, p| acc + *p);
        Some(sum / points.len() as TPtF)
    }
}

pub fn polyline_len(pts: &[PtF]) -> TPtF {
    pts.windows(2).map(|w| w[0].dist(&w[1])).sum()
}

/// Axis aligned rectangle with `x1 <= x2` and `y1 <= y2`, serialized as `[x1, y1, x2, y2]`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Default)]
#[serde(from = "[TPtF; 4]", into = "[TPtF; 4]")]
pub struct RectF {
    pub x1: TPtF,
    pub y1: TPtF,
    pub x2: TPtF,
    pub y2: TPtF,
}
impl RectF {
    /// Normalizes the two given corners.
    pub fn from_corners(a: PtF, b: PtF) -> Self {
        Self {
            x1: a.x.min(b.x),
            y1: a.y.min(b.y),
            x2: a.x.max(b.x),
            y2: a.y.max(b.y),
        }
    }
    pub fn w(&self) -> TPtF {
        self.x2 - self.x1
    }
    pub fn h(&self) -> TPtF {
        self.y2 - self.y1
    }
    /// Clockwise starting at the top-left corner.
    pub fn corners(&self) -> [PtF; 4] {
        [
            PtF::new(self.x1, self.y1),
            PtF::new(self.x2, self.y1),
            PtF::new(self.x2, self.y2),
            PtF::new(self.x1, self.y2),
        ]
    }
    pub fn edges(&self) -> [(PtF, PtF); 4] {
        let c = self.corners();
        [(c[0], c[1]), (c[1], c[2]), (c[2], c[3]), (c[3], c[0])]
    }
    pub fn translate(&self, d: PtF) -> Self {
        Self {
            x1: self.x1 + d.x,
            y1: self.y1 + d.y,
            x2: self.x2 + d.x,
            y2: self.y2 + d.y,
        }
    }
}
impl From<[TPtF; 4]> for RectF {
    fn from(v: [TPtF; 4]) -> Self {
        Self::from_corners(PtF::new(v[0], v[1]), PtF::new(v[2], v[3]))
    }
}
impl From<RectF> for [TPtF; 4] {
    fn from(r: RectF) -> Self {
        [r.x1, r.y1, r.x2, r.y2]
    }
}

#[test]
fn test_dist_lineseg() {
    let ls = (PtF::new(0.0, 0.0), PtF::new(10.0, 0.0));
    assert!(floats_close(dist_lineseg_point(&ls, PtF::new(5.0, 3.0)), 3.0));
    assert!(floats_close(dist_lineseg_point(&ls, PtF::new(13.0, 4.0)), 5.0));
    assert!(floats_close(dist_lineseg_point(&ls, PtF::new(-3.0, -4.0)), 5.0));
    let degenerate = (PtF::new(1.0, 1.0), PtF::new(1.0, 1.0));
    assert!(floats_close(
        dist_lineseg_point(&degenerate, PtF::new(4.0, 5.0)),
        5.0
    ));
}

#[test]
fn test_angle() {
    let v = PtF::new(0.0, 0.0);
    let a = PtF::new(1.0, 0.0);
    assert!(floats_close(angle_abc(a, v, PtF::new(0.0, 1.0)), 90.0));
    assert!(floats_close(angle_abc(a, v, PtF::new(-1.0, 0.0)), 180.0));
    assert!(floats_close(angle_abc(a, v, PtF::new(0.0, -1.0)), 90.0));
    assert!(floats_close(angle_abc(a, v, a), 0.0));
    // folded into [0, 180]
    let deg = angle_abc(PtF::new(-1.0, 0.1), v, PtF::new(-1.0, -0.1));
    assert!(deg < 12.0 && deg > 11.0);
}

#[test]
fn test_rect() {
    let r = RectF::from_corners(PtF::new(5.0, 1.0), PtF::new(2.0, 7.0));
    assert_eq!(r, RectF::from([2.0, 1.0, 5.0, 7.0]));
    assert!(floats_close(r.w(), 3.0));
    assert!(floats_close(r.h(), 6.0));
    assert_eq!(r.corners()[2], PtF::new(5.0, 7.0));
    let s = serde_json::to_string(&r).unwrap();
    assert_eq!(s, "[2.0,1.0,5.0,7.0]");
    let p: PtF = serde_json::from_str("[1.5, -2]").unwrap();
    assert_eq!(p, PtF::new(1.5, -2.0));
}

#[test]
fn test_centroid_polyline() {
    assert_eq!(centroid(&[]), None);
    let pts = [
        PtF::new(0.0, 0.0),
        PtF::new(2.0, 0.0),
        PtF::new(2.0, 2.0),
        PtF::new(0.0, 2.0),
    ];
    assert_eq!(centroid(&pts), Some(PtF::new(1.0, 1.0)));
    assert!(floats_close(polyline_len(&pts), 6.0));
    assert_eq!(
        ShapeF::new(0.0, f64::NAN).at_least_one(),
        ShapeF::new(1.0, 1.0)
    );
}
