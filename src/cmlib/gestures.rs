//! Turns the raw pointer stream into semantic gestures. Precedence is
//! pinch > pan > drag > click.
use crate::{
    domain::{PtF, TPtF},
    events::{PointerButton, PointerId, PointerInput, WheelInput},
    viewport::{Insets, Viewport},
};
use tracing::debug;

/// Positions are in image space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    /// Emitted first for every pointer-down.
    Down(PtF),
    /// At the position of the corresponding down.
    Click(PtF),
    Drag(PtF),
    DragEnd(PtF),
    Hover(PtF),
    Up(PtF),
    /// The viewport changed.
    Transform,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Armed,
    Panning,
    Dragging,
    Pinching,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct DownInfo {
    id: PointerId,
    canvas: PtF,
    image: PtF,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Pinch {
    ids: [PointerId; 2],
    start_dist: TPtF,
    start_k: TPtF,
}

#[derive(Clone, Debug)]
pub struct GestureRecognizer {
    /// Canvas positions in the order the pointers went down.
    pointers: Vec<(PointerId, PtF)>,
    primary: Option<PointerId>,
    drag: Option<PointerId>,
    panning: bool,
    dragging: bool,
    pinch: Option<Pinch>,
    down: Option<DownInfo>,
    click_threshold: TPtF,
    wheel_step: TPtF,
    insets: Insets,
}
impl GestureRecognizer {
    pub fn new(click_threshold: TPtF, wheel_step: TPtF) -> Self {
        GestureRecognizer {
            pointers: vec![],
            primary: None,
            drag: None,
            panning: false,
            dragging: false,
            pinch: None,
            down: None,
            click_threshold,
            wheel_step: if wheel_step > 1.0 { wheel_step } else { 1.1 },
            insets: Insets::default(),
        }
    }
    pub fn set_insets(&mut self, insets: Insets) {
        self.insets = insets;
    }
    pub fn state(&self) -> GestureState {
        if self.pinch.is_some() {
            GestureState::Pinching
        } else if self.panning {
            GestureState::Panning
        } else if self.dragging {
            GestureState::Dragging
        } else if self.down.is_some() {
            GestureState::Armed
        } else {
            GestureState::Idle
        }
    }
    pub fn n_active_pointers(&self) -> usize {
        self.pointers.len()
    }
    pub fn reset(&mut self) {
        self.pointers.clear();
        self.primary = None;
        self.drag = None;
        self.panning = false;
        self.dragging = false;
        self.pinch = None;
        self.down = None;
    }
    fn pointer_pos(&self, id: PointerId) -> Option<PtF> {
        self.pointers.iter().find(|(pid, _)| *pid == id).map(|(_, p)| *p)
    }
    fn pinch_pair(&self, pinch: &Pinch) -> Option<(PtF, PtF)> {
        Some((self.pointer_pos(pinch.ids[0])?, self.pointer_pos(pinch.ids[1])?))
    }

    /// `pan_requested` is the caller's say in whether a new press pans, e.g., pan tool or
    /// held space bar.
    pub fn pointer_down(
        &mut self,
        ev: &PointerInput,
        pan_requested: bool,
        vp: &Viewport,
    ) -> Vec<Gesture> {
        let canvas = vp.event_to_canvas(ev.pos, self.insets);
        let image = vp.canvas_to_image(canvas);
        self.pointers.retain(|(id, _)| *id != ev.id);
        self.pointers.push((ev.id, canvas));
        let gestures = vec![Gesture::Down(image)];
        if self.pointers.len() == 2 {
            let (id0, p0) = self.pointers[0];
            let (id1, p1) = self.pointers[1];
            let d = p0.dist(&p1);
            self.pinch = Some(Pinch {
                ids: [id0, id1],
                start_dist: if d > 0.0 { d } else { 1.0 },
                start_k: vp.k(),
            });
            debug!("pinch started at distance {d}");
            self.panning = false;
            self.dragging = false;
            self.drag = None;
            self.down = None;
        } else if self.pointers.len() == 1 {
            self.primary = Some(ev.id);
            self.drag = Some(ev.id);
            self.dragging = false;
            self.panning = pan_requested
                || ev.modifiers.shift
                || matches!(ev.button, PointerButton::Middle | PointerButton::Secondary);
            self.down = Some(DownInfo {
                id: ev.id,
                canvas,
                image,
            });
        }
        gestures
    }

    pub fn pointer_move(&mut self, ev: &PointerInput, vp: &mut Viewport) -> Vec<Gesture> {
        let canvas = vp.event_to_canvas(ev.pos, self.insets);
        let prev = match self.pointers.iter_mut().find(|(id, _)| *id == ev.id) {
            Some((_, p)) => {
                let prev = *p;
                *p = canvas;
                prev
            }
            None => return vec![Gesture::Hover(vp.canvas_to_image(canvas))],
        };
        if let Some(pinch) = self.pinch {
            if pinch.ids.contains(&ev.id) {
                if let Some((p0, p1)) = self.pinch_pair(&pinch) {
                    let new_k = pinch.start_k * p0.dist(&p1) / pinch.start_dist;
                    let anchor = vp.canvas_to_image(p0.midpoint(&p1));
                    vp.set_zoom_around(new_k, anchor);
                    return vec![Gesture::Transform];
                }
            }
        }
        if self.panning && self.primary == Some(ev.id) {
            vp.pan_by_canvas_delta(canvas - prev);
            return vec![Gesture::Transform];
        }
        let image = vp.canvas_to_image(canvas);
        if self.drag == Some(ev.id) {
            if let Some(down) = &self.down {
                if !self.dragging && canvas.dist(&down.canvas) >= self.click_threshold {
                    self.dragging = true;
                }
            }
            vec![Gesture::Drag(image)]
        } else {
            vec![Gesture::Hover(image)]
        }
    }

    fn lift(&mut self, ev: &PointerInput, vp: &Viewport, allow_click: bool) -> Vec<Gesture> {
        let Some(idx) = self.pointers.iter().position(|(id, _)| *id == ev.id) else {
            return vec![];
        };
        let (_, last) = self.pointers.remove(idx);
        let canvas = if allow_click {
            vp.event_to_canvas(ev.pos, self.insets)
        } else {
            last
        };
        let image = vp.canvas_to_image(canvas);
        let mut gestures = vec![Gesture::Up(image)];
        if self.drag == Some(ev.id) && self.dragging {
            gestures.push(Gesture::DragEnd(image));
        }
        if let Some(down) = self.down {
            if down.id == ev.id
                && allow_click
                && !self.panning
                && !self.dragging
                && canvas.dist(&down.canvas) < self.click_threshold
            {
                gestures.push(Gesture::Click(down.image));
            }
            if down.id == ev.id {
                self.down = None;
            }
        }
        if let Some(pinch) = self.pinch {
            if pinch.ids.contains(&ev.id) {
                debug!("pinch ended");
                self.pinch = None;
            }
        }
        if self.primary == Some(ev.id) {
            self.primary = None;
            self.panning = false;
        }
        if self.drag == Some(ev.id) {
            self.drag = None;
            self.dragging = false;
        }
        gestures
    }
    pub fn pointer_up(&mut self, ev: &PointerInput, vp: &Viewport) -> Vec<Gesture> {
        self.lift(ev, vp, true)
    }
    /// Cleans up like an up but never clicks.
    pub fn pointer_cancel(&mut self, ev: &PointerInput, vp: &Viewport) -> Vec<Gesture> {
        self.lift(ev, vp, false)
    }

    pub fn wheel(&mut self, ev: &WheelInput, vp: &mut Viewport) -> Vec<Gesture> {
        let factor = if ev.delta_y < 0.0 {
            self.wheel_step
        } else if ev.delta_y > 0.0 {
            1.0 / self.wheel_step
        } else {
            return vec![];
        };
        let anchor = vp.canvas_to_image(vp.event_to_canvas(ev.pos, self.insets));
        vp.zoom_by(factor, anchor);
        vec![Gesture::Transform]
    }
}

#[cfg(test)]
use crate::{domain::ShapeF, events::Modifiers, viewport::ZoomLimits};
#[cfg(test)]
fn setup() -> (GestureRecognizer, Viewport) {
    let mut vp = Viewport::new(ShapeF::new(100.0, 100.0), ZoomLimits::default());
    vp.resize(ShapeF::new(100.0, 100.0), Insets::default(), 1.0);
    (GestureRecognizer::new(6.0, 1.1), vp)
}
#[cfg(test)]
fn ptr(id: PointerId, x: f64, y: f64) -> PointerInput {
    PointerInput::new(id, PtF::new(x, y))
}

#[test]
fn test_click_at_down_position() {
    let (mut gr, mut vp) = setup();
    let down = gr.pointer_down(&ptr(1, 10.0, 10.0), false, &vp);
    assert_eq!(down, vec![Gesture::Down(PtF::new(10.0, 10.0))]);
    assert_eq!(gr.state(), GestureState::Armed);
    let mv = gr.pointer_move(&ptr(1, 13.0, 10.0), &mut vp);
    assert_eq!(mv, vec![Gesture::Drag(PtF::new(13.0, 10.0))]);
    assert_eq!(gr.state(), GestureState::Armed);
    let up = gr.pointer_up(&ptr(1, 13.0, 10.0), &vp);
    assert_eq!(
        up,
        vec![
            Gesture::Up(PtF::new(13.0, 10.0)),
            Gesture::Click(PtF::new(10.0, 10.0))
        ]
    );
    assert_eq!(gr.state(), GestureState::Idle);
}

#[test]
fn test_drag_no_click() {
    let (mut gr, mut vp) = setup();
    gr.pointer_down(&ptr(1, 10.0, 10.0), false, &vp);
    gr.pointer_move(&ptr(1, 30.0, 10.0), &mut vp);
    assert_eq!(gr.state(), GestureState::Dragging);
    // coming back does not make it a click
    gr.pointer_move(&ptr(1, 10.0, 10.0), &mut vp);
    let up = gr.pointer_up(&ptr(1, 10.0, 10.0), &vp);
    assert!(up.contains(&Gesture::DragEnd(PtF::new(10.0, 10.0))));
    assert!(!up.iter().any(|g| matches!(g, Gesture::Click(_))));
}

#[test]
fn test_cancel_never_clicks() {
    let (mut gr, vp) = setup();
    gr.pointer_down(&ptr(1, 10.0, 10.0), false, &vp);
    let cancel = gr.pointer_cancel(&ptr(1, 10.0, 10.0), &vp);
    assert_eq!(cancel, vec![Gesture::Up(PtF::new(10.0, 10.0))]);
    assert_eq!(gr.n_active_pointers(), 0);
    assert_eq!(gr.state(), GestureState::Idle);
}

#[test]
fn test_pan() {
    let (mut gr, mut vp) = setup();
    let shift = ptr(1, 10.0, 10.0).modifiers(Modifiers::shift());
    gr.pointer_down(&shift, false, &vp);
    assert_eq!(gr.state(), GestureState::Panning);
    let mv = gr.pointer_move(&ptr(1, 25.0, 5.0), &mut vp);
    assert_eq!(mv, vec![Gesture::Transform]);
    assert_eq!(vp.pan(), PtF::new(15.0, -5.0));
    let up = gr.pointer_up(&ptr(1, 25.0, 5.0), &vp);
    assert!(!up.iter().any(|g| matches!(g, Gesture::Click(_))));

    gr.pointer_down(
        &ptr(2, 0.0, 0.0).button(PointerButton::Middle),
        false,
        &vp,
    );
    assert_eq!(gr.state(), GestureState::Panning);
    gr.pointer_up(&ptr(2, 0.0, 0.0), &vp);
    gr.pointer_down(&ptr(3, 0.0, 0.0), true, &vp);
    assert_eq!(gr.state(), GestureState::Panning);
}

#[test]
fn test_pinch() {
    let (mut gr, mut vp) = setup();
    gr.pointer_down(&ptr(1, 40.0, 50.0), false, &vp);
    gr.pointer_down(&ptr(2, 60.0, 50.0), false, &vp);
    assert_eq!(gr.state(), GestureState::Pinching);
    let mv = gr.pointer_move(&ptr(2, 80.0, 50.0), &mut vp);
    assert_eq!(mv, vec![Gesture::Transform]);
    assert!((vp.k() - 2.0).abs() < 1e-12);
    // midpoint at canvas x = 60 keeps its image point
    let mid = vp.image_to_canvas(PtF::new(60.0, 50.0));
    assert!((mid.x - 60.0).abs() < 1e-9);
    let up = gr.pointer_up(&ptr(2, 80.0, 50.0), &vp);
    assert!(!up.iter().any(|g| matches!(g, Gesture::Click(_))));
    assert_eq!(gr.state(), GestureState::Idle);
    // the remaining pointer only hovers
    let mv = gr.pointer_move(&ptr(1, 45.0, 50.0), &mut vp);
    assert!(matches!(mv[0], Gesture::Hover(_)));
    let up = gr.pointer_up(&ptr(1, 45.0, 50.0), &vp);
    assert_eq!(up.len(), 1);
}

#[test]
fn test_wheel_symmetric() {
    let (mut gr, mut vp) = setup();
    let at = WheelInput {
        pos: PtF::new(30.0, 70.0),
        delta_y: -3.0,
    };
    let anchor = vp.canvas_to_image(at.pos);
    gr.wheel(&at, &mut vp);
    assert!((vp.k() - 1.1).abs() < 1e-12);
    let back = WheelInput {
        pos: at.pos,
        delta_y: 120.0,
    };
    gr.wheel(&back, &mut vp);
    assert!((vp.k() - 1.0).abs() < 1e-12);
    let c = vp.image_to_canvas(anchor);
    assert!((c.x - 30.0).abs() < 1e-9 && (c.y - 70.0).abs() < 1e-9);
    let none = WheelInput {
        pos: at.pos,
        delta_y: 0.0,
    };
    assert!(gr.wheel(&none, &mut vp).is_empty());
}

#[test]
fn test_untracked_hover() {
    let (mut gr, mut vp) = setup();
    let mv = gr.pointer_move(&ptr(9, 5.0, 6.0), &mut vp);
    assert_eq!(mv, vec![Gesture::Hover(PtF::new(5.0, 6.0))]);
    assert!(gr.pointer_up(&ptr(9, 5.0, 6.0), &vp).is_empty());
}
