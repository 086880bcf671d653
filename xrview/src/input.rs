// Abstraction over the XR session's two motion controllers. The runtime
// provides an `XrSession`; the core only ever sees per-frame snapshots and
// the start/end edge signals, so a missing controller is an ordinary state
// rather than an error.

use std::collections::HashMap;

use cgmath::{Quaternion, Vector2, Vector3, Zero};
use lazy_static::lazy_static;

// Standard motion-controller layout: button and axis indices as reported by
// the session's gamepad arrays.
pub const BUTTON_TRIGGER: usize = 0;
pub const BUTTON_SQUEEZE: usize = 1;
pub const BUTTON_THUMBSTICK: usize = 3;
pub const BUTTON_A: usize = 4;
pub const BUTTON_B: usize = 5;
pub const BUTTON_MENU: usize = 12;

pub const AXIS_TOUCHPAD_X: usize = 0;
pub const AXIS_TOUCHPAD_Y: usize = 1;
pub const AXIS_THUMBSTICK_X: usize = 2;
pub const AXIS_THUMBSTICK_Y: usize = 3;

lazy_static! {
    static ref BUTTON_NAMES: HashMap<usize, &'static str> = {
        let mut names = HashMap::new();
        names.insert(BUTTON_TRIGGER, "Trigger");
        names.insert(BUTTON_SQUEEZE, "Squeeze");
        names.insert(BUTTON_THUMBSTICK, "Thumbstick");
        names.insert(BUTTON_A, "X/A");
        names.insert(BUTTON_B, "Y/B");
        names.insert(BUTTON_MENU, "Menu");
        names
    };
}

/// Diagnostic name for a button index.
pub fn button_name(index: usize) -> String {
    match BUTTON_NAMES.get(&index) {
        Some(name) => (*name).to_owned(),
        None => format!("Button{index}"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ButtonState {
    pub pressed: bool,
    pub touched: bool,
    pub value: f32,
}

/// One frame's snapshot of a single input source. The pose is local to the
/// controller's current parent (rig while immersive, world root otherwise).
#[derive(Clone, Debug)]
pub struct InputSample {
    pub hand: Hand,
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub buttons: Vec<ButtonState>,
    pub axes: Vec<f32>,
}

impl InputSample {
    pub fn new(hand: Hand) -> InputSample {
        InputSample {
            hand,
            position: Vector3::zero(),
            rotation: Quaternion {
                v: Vector3::zero(),
                s: 1.0,
            },
            buttons: Vec::new(),
            axes: Vec::new(),
        }
    }

    pub fn button_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).map_or(false, |b| b.pressed)
    }

    pub fn button_value(&self, index: usize) -> f32 {
        self.buttons.get(index).map_or(0.0, |b| b.value)
    }

    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn trigger(&self) -> f32 {
        self.button_value(BUTTON_TRIGGER)
    }

    pub fn squeeze(&self) -> f32 {
        self.button_value(BUTTON_SQUEEZE)
    }

    pub fn thumbstick(&self) -> Vector2<f32> {
        Vector2::new(self.axis(AXIS_THUMBSTICK_X), self.axis(AXIS_THUMBSTICK_Y))
    }

    pub fn touchpad(&self) -> Vector2<f32> {
        Vector2::new(self.axis(AXIS_TOUCHPAD_X), self.axis(AXIS_TOUCHPAD_Y))
    }
}

/// Edge signal from the session collaborator; fired at most once per
/// transition, drained at the start of each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    Started,
    Ended,
}

/// The XR-session collaborator. `sample` returns `None` whenever there is no
/// active session or no paired controller at that hand; desktop mode always
/// answers `None`.
pub trait XrSession {
    fn poll_event(&mut self) -> Option<SessionEvent>;
    fn sample(&self, hand: Hand) -> Option<InputSample>;
}

/// Session stub for desktop-only operation: no events, no controllers.
#[derive(Default)]
pub struct NoSession;

impl XrSession for NoSession {
    fn poll_event(&mut self) -> Option<SessionEvent> {
        None
    }

    fn sample(&self, _hand: Hand) -> Option<InputSample> {
        None
    }
}
