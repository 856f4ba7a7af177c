//! Frontend independent input events. Positions are css pixels relative to the outer box
//! of the canvas element.
use crate::domain::PtF;

pub type PointerId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Middle,
    Secondary,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}
impl Modifiers {
    pub fn shift() -> Self {
        Modifiers {
            shift: true,
            ..Default::default()
        }
    }
    pub fn ctrl() -> Self {
        Modifiers {
            ctrl: true,
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerInput {
    pub id: PointerId,
    pub pos: PtF,
    pub button: PointerButton,
    pub modifiers: Modifiers,
    /// Seconds since an arbitrary but fixed start.
    pub time: f64,
}
impl PointerInput {
    pub fn new(id: PointerId, pos: PtF) -> Self {
        PointerInput {
            id,
            pos,
            button: PointerButton::Primary,
            modifiers: Modifiers::default(),
            time: 0.0,
        }
    }
    pub fn button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }
    pub fn modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
    pub fn time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelInput {
    pub pos: PtF,
    /// Positive values scroll down and zoom out.
    pub delta_y: f64,
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum KeyCode {
    F,
    Z,
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    PlusEquals,
    Minus,
    Delete,
    Back,
    Enter,
    Space,
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown(PointerInput),
    PointerMove(PointerInput),
    PointerUp(PointerInput),
    PointerCancel(PointerInput),
    Wheel(WheelInput),
    KeyPressed(KeyCode, Modifiers),
    KeyReleased(KeyCode, Modifiers),
}
