use crate::{
    annotations::{Annotation, AnnotationId, GeoFig},
    domain::{PtF, TPtF},
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragKind {
    SegmentA,
    SegmentB,
    MoveSegment,
    /// The opposite corner stays where it was when the drag started.
    RectCorner { opposite: PtF },
    MoveRect,
    PolyVertex(usize),
    MovePoly,
    AngleA,
    AngleV,
    AngleB,
    MoveAngle,
    MoveNote,
}

/// Index of the point closest to `p` that is closer than `tol`.
fn nearest_within(points: &[PtF], p: PtF, tol: TPtF) -> Option<usize> {
    let mut best = None;
    let mut best_d = tol;
    for (i, q) in points.iter().enumerate() {
        let d = q.dist(&p);
        if d < best_d {
            best_d = d;
            best = Some(i);
        }
    }
    best
}

/// Edits the live geometry of one annotation while the pointer is down. The frozen scale
/// is never touched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DragHandle {
    pub id: AnnotationId,
    pub kind: DragKind,
    last: PtF,
}
impl DragHandle {
    /// `p` is where the drag starts, vertices closer than `tol` are grabbed, otherwise the
    /// whole figure moves.
    pub fn new(anno: &Annotation, p: PtF, tol: TPtF) -> Self {
        let kind = match &anno.geo {
            GeoFig::Segment { a, b, .. } => match nearest_within(&[*a, *b], p, tol) {
                Some(0) => DragKind::SegmentA,
                Some(_) => DragKind::SegmentB,
                None => DragKind::MoveSegment,
            },
            GeoFig::Rectangle { rect, .. } => {
                let corners = rect.corners();
                match nearest_within(&corners, p, tol) {
                    Some(i) => DragKind::RectCorner {
                        opposite: corners[(i + 2) % 4],
                    },
                    None => DragKind::MoveRect,
                }
            }
            GeoFig::Polyline { pts, .. } => match nearest_within(pts, p, tol) {
                Some(i) => DragKind::PolyVertex(i),
                None => DragKind::MovePoly,
            },
            GeoFig::Angle { a, v, b, .. } => match nearest_within(&[*a, *v, *b], p, tol) {
                Some(0) => DragKind::AngleA,
                Some(1) => DragKind::AngleV,
                Some(_) => DragKind::AngleB,
                None => DragKind::MoveAngle,
            },
            GeoFig::Note { .. } => DragKind::MoveNote,
        };
        DragHandle {
            id: anno.id,
            kind,
            last: p,
        }
    }

    /// Vertex drags take snapped positions, moves take raw ones.
    pub fn moves_vertex(&self) -> bool {
        matches!(
            self.kind,
            DragKind::SegmentA
                | DragKind::SegmentB
                | DragKind::RectCorner { .. }
                | DragKind::PolyVertex(_)
                | DragKind::AngleA
                | DragKind::AngleV
                | DragKind::AngleB
        )
    }

    pub fn apply(&mut self, geo: &mut GeoFig, p: PtF) {
        let delta = p - self.last;
        self.last = p;
        match (self.kind, geo) {
            (DragKind::SegmentA, GeoFig::Segment { a, .. }) => *a = p,
            (DragKind::SegmentB, GeoFig::Segment { b, .. }) => *b = p,
            (DragKind::RectCorner { opposite }, GeoFig::Rectangle { rect, .. }) => {
                *rect = crate::domain::RectF::from_corners(p, opposite);
            }
            (DragKind::PolyVertex(i), GeoFig::Polyline { pts, .. }) => {
                if let Some(v) = pts.get_mut(i) {
                    *v = p;
                }
            }
            (DragKind::AngleA, GeoFig::Angle { a, .. }) => *a = p,
            (DragKind::AngleV, GeoFig::Angle { v, .. }) => *v = p,
            (DragKind::AngleB, GeoFig::Angle { b, .. }) => *b = p,
            (
                DragKind::MoveSegment
                | DragKind::MoveRect
                | DragKind::MovePoly
                | DragKind::MoveAngle
                | DragKind::MoveNote,
                geo,
            ) => geo.translate(delta),
            _ => (),
        }
    }
}

#[cfg(test)]
use crate::{annotations::Calib, domain::RectF};

#[test]
fn test_rect_corner() {
    let anno = Annotation {
        id: 1,
        geo: GeoFig::Rectangle {
            rect: RectF::from([10.0, 10.0, 50.0, 40.0]),
            calib: Calib::default(),
        },
    };
    let mut handle = DragHandle::new(&anno, PtF::new(51.0, 41.0), 5.0);
    assert_eq!(
        handle.kind,
        DragKind::RectCorner {
            opposite: PtF::new(10.0, 10.0)
        }
    );
    let mut geo = anno.geo.clone();
    // inwards
    handle.apply(&mut geo, PtF::new(30.0, 20.0));
    assert!(matches!(geo, GeoFig::Rectangle { rect, .. } if rect == RectF::from([10.0, 10.0, 30.0, 20.0])));
    // across the opposite corner
    handle.apply(&mut geo, PtF::new(0.0, 5.0));
    match geo {
        GeoFig::Rectangle { rect, .. } => {
            assert!(rect.x1 <= rect.x2 && rect.y1 <= rect.y2);
            assert_eq!(rect, RectF::from([0.0, 5.0, 10.0, 10.0]));
        }
        _ => panic!("rectangle expected"),
    }
}

#[test]
fn test_move_and_vertices() {
    let seg = Annotation {
        id: 2,
        geo: GeoFig::Segment {
            a: PtF::new(0.0, 0.0),
            b: PtF::new(100.0, 0.0),
            calib: Calib {
                mm_per_px: 0.25,
                ..Default::default()
            },
        },
    };
    let mut geo = seg.geo.clone();
    let mut mv = DragHandle::new(&seg, PtF::new(50.0, 1.0), 5.0);
    assert_eq!(mv.kind, DragKind::MoveSegment);
    assert!(!mv.moves_vertex());
    mv.apply(&mut geo, PtF::new(60.0, 11.0));
    mv.apply(&mut geo, PtF::new(70.0, 11.0));
    assert!(matches!(&geo, GeoFig::Segment { a, b, calib }
        if *a == PtF::new(20.0, 10.0) && *b == PtF::new(120.0, 10.0) && calib.mm_per_px == 0.25));
    let mut vb = DragHandle::new(&seg, PtF::new(98.0, 0.0), 5.0);
    assert_eq!(vb.kind, DragKind::SegmentB);
    let mut geo = seg.geo.clone();
    vb.apply(&mut geo, PtF::new(3.0, 4.0));
    assert!(matches!(&geo, GeoFig::Segment { b, .. } if *b == PtF::new(3.0, 4.0)));

    let ang = Annotation {
        id: 3,
        geo: GeoFig::Angle {
            a: PtF::new(10.0, 0.0),
            v: PtF::new(0.0, 0.0),
            b: PtF::new(0.0, 10.0),
            calib: Calib::default(),
        },
    };
    assert_eq!(DragHandle::new(&ang, PtF::new(1.0, 1.0), 5.0).kind, DragKind::AngleV);
    assert_eq!(DragHandle::new(&ang, PtF::new(5.0, 0.0), 2.0).kind, DragKind::MoveAngle);
}
