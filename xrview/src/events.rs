// Semantic events produced by one frame tick. The core pushes values into a
// per-frame queue handed back to the caller; nothing here holds callbacks or
// captured state.

use cgmath::Point3;
use scene::NodeId;

use crate::input::Hand;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InteractionEvent {
    /// The targeted object changed (possibly to nothing). Emitted only on
    /// change, never while the target stays the same.
    HoverChanged {
        hand: Hand,
        node: Option<NodeId>,
        point: Option<Point3<f32>>,
    },
    SelectStart {
        hand: Hand,
        node: NodeId,
        point: Point3<f32>,
    },
    SelectEnd {
        hand: Hand,
    },
    GrabStart {
        hand: Hand,
        node: NodeId,
        point: Point3<f32>,
    },
    GrabEnd {
        hand: Hand,
        node: NodeId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeEvent {
    EnteredImmersive,
    EnteredDesktop,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ViewerEvent {
    Mode(ModeEvent),
    Interaction(InteractionEvent),
    Jumped,
}
