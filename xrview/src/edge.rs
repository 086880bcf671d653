// Press/release edge detection over per-frame button snapshots. One
// transition per physical edge; a sustained hold emits nothing. Sampling is
// once per frame, so toggles faster than a frame are not observable.

use crate::input::ButtonState;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ButtonEdge {
    pub index: usize,
    pub transition: Transition,
}

impl ButtonEdge {
    pub fn is_press(&self, index: usize) -> bool {
        self.index == index && self.transition == Transition::Pressed
    }

    pub fn is_release(&self, index: usize) -> bool {
        self.index == index && self.transition == Transition::Released
    }
}

/// Previous frame's pressed flags for one input source.
#[derive(Default)]
pub struct ButtonEdges {
    previous: Vec<bool>,
}

impl ButtonEdges {
    pub fn new() -> ButtonEdges {
        ButtonEdges::default()
    }

    /// Diff `current` against the stored snapshot, then store it. The button
    /// count may change between frames (controller reconnect): indices beyond
    /// the shorter previous array count as previously released, and indices
    /// that vanished while pressed emit a release so no press dangles.
    pub fn detect(&mut self, current: &[ButtonState]) -> Vec<ButtonEdge> {
        let mut edges = Vec::new();

        for (index, button) in current.iter().enumerate() {
            let was_pressed = self.previous.get(index).copied().unwrap_or(false);
            if button.pressed && !was_pressed {
                edges.push(ButtonEdge {
                    index,
                    transition: Transition::Pressed,
                });
            } else if !button.pressed && was_pressed {
                edges.push(ButtonEdge {
                    index,
                    transition: Transition::Released,
                });
            }
        }

        for index in current.len()..self.previous.len() {
            if self.previous[index] {
                edges.push(ButtonEdge {
                    index,
                    transition: Transition::Released,
                });
            }
        }

        self.previous.clear();
        self.previous.extend(current.iter().map(|b| b.pressed));
        edges
    }

    /// Forget the stored snapshot, e.g. when the source disconnects. The next
    /// snapshot is then diffed against an all-released baseline.
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}
