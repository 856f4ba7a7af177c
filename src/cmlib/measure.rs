//! Physical measurements and the labels that show them.
use crate::{
    annotations::GeoFig,
    domain::{PtF, RectF, TPtF, angle_abc, polyline_len},
    units::Unit,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Measurement {
    LengthMm(TPtF),
    RectMm { w: TPtF, h: TPtF, area: TPtF },
    AngleDeg(TPtF),
    Nothing,
}

pub fn measure(geo: &GeoFig) -> Measurement {
    match geo {
        GeoFig::Segment { a, b, calib } => Measurement::LengthMm(a.dist(b) * calib.mm_per_px),
        GeoFig::Polyline { pts, calib } => {
            Measurement::LengthMm(polyline_len(pts) * calib.mm_per_px)
        }
        GeoFig::Rectangle { rect, calib } => rect_mm(rect, calib.mm_per_px),
        GeoFig::Angle { a, v, b, .. } => Measurement::AngleDeg(angle_abc(*a, *v, *b)),
        GeoFig::Note { .. } => Measurement::Nothing,
    }
}

fn rect_mm(rect: &RectF, mm_per_px: TPtF) -> Measurement {
    let w = rect.w() * mm_per_px;
    let h = rect.h() * mm_per_px;
    Measurement::RectMm { w, h, area: w * h }
}

pub fn length_label(mm: TPtF, unit: Unit) -> String {
    format!("{:.3} {}", unit.from_mm(mm), unit.label())
}
/// Area is always in mm².
pub fn rect_label(w_mm: TPtF, h_mm: TPtF, area_mm2: TPtF, unit: Unit) -> String {
    format!(
        "{:.3}×{:.3} {} • A {:.1} mm²",
        unit.from_mm(w_mm),
        unit.from_mm(h_mm),
        unit.label(),
        area_mm2
    )
}
pub fn angle_label(deg: TPtF) -> String {
    format!("θ {deg:.2}°")
}

pub fn measurement_label(m: Measurement, unit: Unit) -> Option<String> {
    match m {
        Measurement::LengthMm(mm) => Some(length_label(mm, unit)),
        Measurement::RectMm { w, h, area } => Some(rect_label(w, h, area, unit)),
        Measurement::AngleDeg(deg) => Some(angle_label(deg)),
        Measurement::Nothing => None,
    }
}

/// Label text for an annotation in the display unit. Notes show their text.
pub fn label(geo: &GeoFig, unit: Unit) -> String {
    match geo {
        GeoFig::Note { text, .. } => text.clone(),
        _ => measurement_label(measure(geo), unit).unwrap_or_default(),
    }
}

/// Where the label of a figure is anchored in image space.
pub fn label_anchor(geo: &GeoFig) -> PtF {
    match geo {
        GeoFig::Segment { a, b, .. } => a.midpoint(b),
        GeoFig::Polyline { pts, .. } => pts.get(pts.len() / 2).copied().unwrap_or_default(),
        GeoFig::Rectangle { rect, .. } => PtF::new((rect.x1 + rect.x2) * 0.5, rect.y1),
        GeoFig::Angle { v, .. } => *v,
        GeoFig::Note { p, .. } => *p,
    }
}

/// Approximate label of a figure under construction.
pub fn preview_label(m: Measurement, unit: Unit) -> Option<String> {
    measurement_label(m, unit).map(|s| format!("~{s}"))
}

/// Scale read-out, e.g., `Scale: 52.00 µm/px | 0.052000 mm/px`.
pub fn scale_label(mm_per_px: TPtF, unit: Unit) -> String {
    format!(
        "Scale: {:.2} µm/px | {:.6} {}/px",
        mm_per_px * 1000.0,
        unit.from_mm(mm_per_px),
        unit.label()
    )
}

#[cfg(test)]
use crate::annotations::Calib;
#[cfg(test)]
fn calib(mm_per_px: f64) -> Calib {
    Calib {
        mm_per_px,
        ..Default::default()
    }
}

#[test]
fn test_segment() {
    let geo = GeoFig::Segment {
        a: PtF::new(0.0, 0.0),
        b: PtF::new(3.0, 4.0),
        calib: calib(1.0),
    };
    assert_eq!(label(&geo, Unit::Mm), "5.000 mm");
    assert_eq!(label(&geo, Unit::Cm), "0.500 cm");
    let geo = GeoFig::Segment {
        a: PtF::new(0.0, 0.0),
        b: PtF::new(3.0, 4.0),
        calib: calib(0.0),
    };
    assert_eq!(label(&geo, Unit::Mm), "0.000 mm");
}

#[test]
fn test_rect() {
    let geo = GeoFig::Rectangle {
        rect: RectF::from_corners(PtF::new(0.0, 0.0), PtF::new(2.0, 3.0)),
        calib: calib(1.0),
    };
    let mm = label(&geo, Unit::Mm);
    assert!(mm.contains("A 6.0 mm²"));
    assert_eq!(mm, "2.000×3.000 mm • A 6.0 mm²");
    let cm = label(&geo, Unit::Cm);
    assert!(cm.contains("0.200×0.300 cm"));
    assert!(cm.contains("A 6.0 mm²"));
    assert_eq!(label_anchor(&geo), PtF::new(1.0, 0.0));
}

#[test]
fn test_angle_and_poly() {
    let right = GeoFig::Angle {
        a: PtF::new(1.0, 0.0),
        v: PtF::new(0.0, 0.0),
        b: PtF::new(0.0, 1.0),
        calib: calib(1.0),
    };
    assert_eq!(label(&right, Unit::Mm), "θ 90.00°");
    let straight = GeoFig::Angle {
        a: PtF::new(1.0, 0.0),
        v: PtF::new(0.0, 0.0),
        b: PtF::new(-1.0, 0.0),
        calib: calib(1.0),
    };
    assert_eq!(label(&straight, Unit::Inch), "θ 180.00°");
    let poly = GeoFig::Polyline {
        pts: vec![PtF::new(0.0, 0.0), PtF::new(10.0, 0.0), PtF::new(10.0, 10.0)],
        calib: calib(0.5),
    };
    assert_eq!(label(&poly, Unit::Mm), "10.000 mm");
    assert_eq!(label_anchor(&poly), PtF::new(10.0, 0.0));
    assert_eq!(
        preview_label(measure(&poly), Unit::Mm),
        Some("~10.000 mm".to_string())
    );
    let note = GeoFig::Note {
        p: PtF::default(),
        text: "crack".into(),
    };
    assert_eq!(label(&note, Unit::Mm), "crack");
    assert_eq!(preview_label(measure(&note), Unit::Mm), None);
}

#[test]
fn test_scale_label() {
    assert_eq!(
        scale_label(0.052, Unit::Mm),
        "Scale: 52.00 µm/px | 0.052000 mm/px"
    );
}
