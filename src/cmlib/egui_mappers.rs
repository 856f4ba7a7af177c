use crate::{
    domain::PtF,
    events::{InputEvent, KeyCode, Modifiers, PointerButton, PointerId, PointerInput, WheelInput},
};
use std::collections::HashSet;

pub fn map_key(egui_key: egui::Key) -> Option<KeyCode> {
    match egui_key {
        egui::Key::F => Some(KeyCode::F),
        egui::Key::Z => Some(KeyCode::Z),
        egui::Key::Num0 => Some(KeyCode::Key0),
        egui::Key::Num1 => Some(KeyCode::Key1),
        egui::Key::Num2 => Some(KeyCode::Key2),
        egui::Key::Num3 => Some(KeyCode::Key3),
        egui::Key::Num4 => Some(KeyCode::Key4),
        egui::Key::Num5 => Some(KeyCode::Key5),
        egui::Key::Num6 => Some(KeyCode::Key6),
        egui::Key::Plus | egui::Key::Equals => Some(KeyCode::PlusEquals),
        egui::Key::Minus => Some(KeyCode::Minus),
        egui::Key::Delete => Some(KeyCode::Delete),
        egui::Key::Backspace => Some(KeyCode::Back),
        egui::Key::Enter => Some(KeyCode::Enter),
        egui::Key::Space => Some(KeyCode::Space),
        egui::Key::Escape => Some(KeyCode::Escape),
        _ => None,
    }
}

pub fn map_modifiers(modifiers: egui::Modifiers) -> Modifiers {
    Modifiers {
        shift: modifiers.shift,
        ctrl: modifiers.ctrl || modifiers.command,
        alt: modifiers.alt,
    }
}

pub fn map_button(button: egui::PointerButton) -> PointerButton {
    match button {
        egui::PointerButton::Primary => PointerButton::Primary,
        egui::PointerButton::Middle => PointerButton::Middle,
        egui::PointerButton::Secondary => PointerButton::Secondary,
        _ => PointerButton::Other,
    }
}

const MOUSE_ID: PointerId = 0;

/// Translates egui events into overlay input events relative to the canvas' outer rect.
/// The mouse has pointer id 0, touches are shifted by one. While fingers are on the
/// screen, mouse events are dropped since platforms emulate them from touches.
#[derive(Debug, Default)]
pub struct EguiInputMapper {
    touches: HashSet<PointerId>,
    mouse_down: bool,
    last_mouse: Option<PtF>,
}
impl EguiInputMapper {
    fn relative(rect: egui::Rect, pos: egui::Pos2) -> PtF {
        PtF::new(f64::from(pos.x - rect.min.x), f64::from(pos.y - rect.min.y))
    }

    pub fn is_mouse_down(&self) -> bool {
        self.mouse_down
    }

    /// Presses only count inside `canvas_rect`. Releases and moves of pointers that are down
    /// are forwarded wherever they happen.
    pub fn map_events(
        &mut self,
        events: &[egui::Event],
        canvas_rect: egui::Rect,
        time: f64,
    ) -> Vec<InputEvent> {
        let mut mapped = vec![];
        for e in events {
            match e {
                egui::Event::Touch { id, phase, pos, .. } => {
                    let pid = id.0.wrapping_add(1);
                    let inp = PointerInput::new(pid, Self::relative(canvas_rect, *pos)).time(time);
                    match phase {
                        egui::TouchPhase::Start => {
                            if canvas_rect.contains(*pos) {
                                self.touches.insert(pid);
                                mapped.push(InputEvent::PointerDown(inp));
                            }
                        }
                        egui::TouchPhase::Move => {
                            if self.touches.contains(&pid) {
                                mapped.push(InputEvent::PointerMove(inp));
                            }
                        }
                        egui::TouchPhase::End => {
                            if self.touches.remove(&pid) {
                                mapped.push(InputEvent::PointerUp(inp));
                            }
                        }
                        egui::TouchPhase::Cancel => {
                            if self.touches.remove(&pid) {
                                mapped.push(InputEvent::PointerCancel(inp));
                            }
                        }
                    }
                }
                egui::Event::PointerButton { .. }
                | egui::Event::PointerMoved(_)
                | egui::Event::PointerGone
                    if !self.touches.is_empty() => {}
                egui::Event::PointerButton {
                    pos,
                    button,
                    pressed,
                    modifiers,
                } => {
                    let inp = PointerInput::new(MOUSE_ID, Self::relative(canvas_rect, *pos))
                        .button(map_button(*button))
                        .modifiers(map_modifiers(*modifiers))
                        .time(time);
                    if *pressed && !self.mouse_down && canvas_rect.contains(*pos) {
                        self.mouse_down = true;
                        mapped.push(InputEvent::PointerDown(inp));
                    } else if !*pressed && self.mouse_down {
                        self.mouse_down = false;
                        mapped.push(InputEvent::PointerUp(inp));
                    }
                }
                egui::Event::PointerMoved(pos) => {
                    let p = Self::relative(canvas_rect, *pos);
                    self.last_mouse = Some(p);
                    if self.mouse_down || canvas_rect.contains(*pos) {
                        mapped.push(InputEvent::PointerMove(
                            PointerInput::new(MOUSE_ID, p).time(time),
                        ));
                    }
                }
                egui::Event::PointerGone => {
                    if let (true, Some(p)) = (self.mouse_down, self.last_mouse) {
                        self.mouse_down = false;
                        mapped.push(InputEvent::PointerCancel(
                            PointerInput::new(MOUSE_ID, p).time(time),
                        ));
                    }
                }
                egui::Event::MouseWheel { delta, .. } => {
                    if let Some(p) = self.last_mouse.filter(|_| delta.y != 0.0) {
                        mapped.push(InputEvent::Wheel(WheelInput {
                            pos: p,
                            delta_y: -f64::from(delta.y),
                        }));
                    }
                }
                egui::Event::Zoom(z) => {
                    if let Some(p) = self.last_mouse.filter(|_| *z != 1.0) {
                        mapped.push(InputEvent::Wheel(WheelInput {
                            pos: p,
                            delta_y: 1.0 - f64::from(*z),
                        }));
                    }
                }
                egui::Event::Key {
                    key,
                    pressed,
                    repeat,
                    modifiers,
                    ..
                } => {
                    if let Some(k) = map_key(*key) {
                        let m = map_modifiers(*modifiers);
                        if !pressed {
                            mapped.push(InputEvent::KeyReleased(k, m));
                        } else if !repeat || k != KeyCode::Space {
                            mapped.push(InputEvent::KeyPressed(k, m));
                        }
                    }
                }
                _ => (),
            }
        }
        mapped
    }
}

#[cfg(test)]
fn rect() -> egui::Rect {
    egui::Rect::from_min_size(egui::pos2(100.0, 50.0), egui::vec2(200.0, 100.0))
}

#[test]
fn test_mouse() {
    let mut mapper = EguiInputMapper::default();
    let events = vec![
        egui::Event::PointerMoved(egui::pos2(110.0, 60.0)),
        egui::Event::PointerButton {
            pos: egui::pos2(110.0, 60.0),
            button: egui::PointerButton::Primary,
            pressed: true,
            modifiers: egui::Modifiers::SHIFT,
        },
        egui::Event::PointerMoved(egui::pos2(400.0, 60.0)),
        egui::Event::PointerButton {
            pos: egui::pos2(400.0, 60.0),
            button: egui::PointerButton::Primary,
            pressed: false,
            modifiers: egui::Modifiers::NONE,
        },
        egui::Event::PointerMoved(egui::pos2(500.0, 60.0)),
    ];
    let mapped = mapper.map_events(&events, rect(), 1.5);
    assert_eq!(mapped.len(), 4);
    match mapped[1] {
        InputEvent::PointerDown(p) => {
            assert_eq!(p.pos, PtF::new(10.0, 10.0));
            assert!(p.modifiers.shift);
            assert_eq!(p.time, 1.5);
        }
        _ => panic!("pointer down expected"),
    }
    assert!(matches!(mapped[2], InputEvent::PointerMove(p) if p.pos == PtF::new(300.0, 10.0)));
    assert!(matches!(mapped[3], InputEvent::PointerUp(_)));
    assert!(!mapper.is_mouse_down());
}

#[test]
fn test_touch_suppresses_mouse() {
    let mut mapper = EguiInputMapper::default();
    let touch = |id: u64, phase: egui::TouchPhase, x: f32| egui::Event::Touch {
        device_id: egui::TouchDeviceId(0),
        id: egui::TouchId(id),
        phase,
        pos: egui::pos2(x, 100.0),
        force: None,
    };
    let events = vec![
        touch(0, egui::TouchPhase::Start, 120.0),
        touch(5, egui::TouchPhase::Start, 150.0),
        egui::Event::PointerButton {
            pos: egui::pos2(120.0, 100.0),
            button: egui::PointerButton::Primary,
            pressed: true,
            modifiers: egui::Modifiers::NONE,
        },
        touch(5, egui::TouchPhase::Move, 170.0),
        touch(0, egui::TouchPhase::End, 120.0),
        touch(5, egui::TouchPhase::Cancel, 170.0),
    ];
    let mapped = mapper.map_events(&events, rect(), 0.0);
    let ids: Vec<_> = mapped
        .iter()
        .map(|e| match e {
            InputEvent::PointerDown(p) => ("down", p.id),
            InputEvent::PointerMove(p) => ("move", p.id),
            InputEvent::PointerUp(p) => ("up", p.id),
            InputEvent::PointerCancel(p) => ("cancel", p.id),
            _ => ("other", 99),
        })
        .collect();
    assert_eq!(
        ids,
        vec![("down", 1), ("down", 6), ("move", 6), ("up", 1), ("cancel", 6)]
    );
    assert!(!mapper.is_mouse_down());
}

#[test]
fn test_keys() {
    assert_eq!(map_key(egui::Key::Equals), Some(KeyCode::PlusEquals));
    assert_eq!(map_key(egui::Key::Num6), Some(KeyCode::Key6));
    assert_eq!(map_key(egui::Key::Q), None);
    let m = map_modifiers(egui::Modifiers::COMMAND);
    assert!(m.ctrl && !m.shift);
}
