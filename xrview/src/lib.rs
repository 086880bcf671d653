pub mod edge;
pub mod events;
pub mod input;
pub mod locomotion;
pub mod session;
pub mod time;

mod interaction;

pub use events::{InteractionEvent, ModeEvent, ViewerEvent};
pub use input::{Hand, InputSample, SessionEvent, XrSession};
pub use locomotion::{Boundary, MovementSettings};
pub use session::{OrbitControl, Overlay, PresentationMode, Vantage};

use cgmath::{vec3, Rotation, Vector2, Vector3};
use scene::{NodeId, NodeKind, Ray, SceneGraph};
use tracing::trace;

use crate::edge::{ButtonEdges, Transition};
use crate::input::{button_name, BUTTON_A};
use crate::interaction::InteractionState;
use crate::locomotion::Locomotion;
use crate::session::SessionRig;
use crate::time::Time;

pub struct ViewerOptions {
    pub movement: MovementSettings,
    pub boundary: Option<Boundary>,
    pub vantage: Option<Vantage>,
    pub initial_viewpoint: Vector3<f32>,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            movement: MovementSettings::default(),
            boundary: None,
            vantage: None,
            initial_viewpoint: vec3(0.0, 1.6, 5.0),
        }
    }
}

/// Desktop-mode input for one frame: a WASD-style move vector, a jump flag,
/// and an optional pointer ray with its select transition. Ignored entirely
/// while a headset is presenting.
pub struct DesktopInput {
    pub move_input: Vector2<f32>,
    pub jump: bool,
    pub pointer: Option<PointerInput>,
}

impl Default for DesktopInput {
    fn default() -> Self {
        Self {
            move_input: Vector2::new(0.0, 0.0),
            jump: false,
            pointer: None,
        }
    }
}

pub struct PointerInput {
    pub ray: Ray,
    pub select: Option<Transition>,
}

/// The dual-mode viewer core: one scene graph, one interactable set, one
/// locomotion model, shared between the desktop and immersive presentations.
/// Drive it with one `update` per display refresh.
pub struct Viewer {
    graph: SceneGraph,
    rig: SessionRig,
    locomotion: Locomotion,
    edges: [ButtonEdges; 2],
    hands: [InteractionState; 2],
    pointer: InteractionState,
    interactables: Vec<NodeId>,
}

impl Viewer {
    pub fn new(options: ViewerOptions) -> Viewer {
        let mut graph = SceneGraph::new();
        let viewpoint = graph.spawn_named(NodeKind::Group, "viewpoint");
        graph.set_local_position(viewpoint, options.initial_viewpoint);

        let mut rig = SessionRig::new(&mut graph, viewpoint);
        rig.set_vantage(options.vantage);

        let mut locomotion = Locomotion::new(options.movement);
        locomotion.set_boundary(options.boundary);

        Viewer {
            graph,
            rig,
            locomotion,
            edges: [ButtonEdges::new(), ButtonEdges::new()],
            hands: [InteractionState::default(), InteractionState::default()],
            pointer: InteractionState::default(),
            interactables: Vec::new(),
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn viewpoint(&self) -> NodeId {
        self.rig.viewpoint()
    }

    pub fn controller(&self, hand: Hand) -> NodeId {
        self.rig.controller(hand)
    }

    pub fn mode(&self) -> PresentationMode {
        self.rig.mode()
    }

    pub fn movement_target(&self) -> NodeId {
        self.rig.movement_target()
    }

    pub fn grabbed_object(&self, hand: Hand) -> Option<NodeId> {
        self.hands[hand.index()].grabbed_node()
    }

    pub fn hovered_object(&self, hand: Hand) -> Option<NodeId> {
        self.hands[hand.index()].hovered_node()
    }

    pub fn is_selecting(&self, hand: Hand) -> bool {
        self.hands[hand.index()].is_selecting()
    }

    /// Replace the candidate set wholesale. In-flight grabs are unaffected.
    pub fn set_interactables(&mut self, interactables: Vec<NodeId>) {
        self.interactables = interactables;
    }

    pub fn interactables(&self) -> &[NodeId] {
        &self.interactables
    }

    pub fn set_boundary(&mut self, boundary: Option<Boundary>) {
        self.locomotion.set_boundary(boundary);
    }

    pub fn set_ground_level(&mut self, level: f32) {
        self.locomotion.set_ground_level(level);
    }

    pub fn set_player_height(&mut self, height: f32) {
        let target = self.rig.movement_target();
        let immersive = self.rig.is_immersive();
        self.locomotion
            .set_player_height(height, &mut self.graph, target, immersive);
    }

    pub fn set_movement_enabled(&mut self, enabled: bool) {
        self.locomotion.set_movement_enabled(enabled);
    }

    pub fn set_vantage(&mut self, vantage: Option<Vantage>) {
        self.rig.set_vantage(vantage);
    }

    /// One frame tick. Order matters: session transitions settle the
    /// topology, then sampling, edge detection and interaction read it, then
    /// locomotion moves the target, and the frame's semantic events are
    /// returned to the caller.
    pub fn update(
        &mut self,
        time: &Time,
        session: &mut dyn XrSession,
        desktop: &DesktopInput,
        orbit: &mut dyn OrbitControl,
        overlay: &mut dyn Overlay,
    ) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        trace!("frame tick, elapsed {:?}", time.elapsed);

        while let Some(signal) = session.poll_event() {
            let standing = self.locomotion.effective_ground_level(true);
            if let Some(mode_event) =
                self.rig
                    .handle_event(&mut self.graph, signal, standing, orbit, overlay)
            {
                events.push(ViewerEvent::Mode(mode_event));
            }
        }

        let immersive = self.rig.is_immersive();
        let fallback_root = self.graph.top_level_ancestor(self.rig.movement_target());
        let head_forward = self
            .graph
            .world_rotation(self.rig.viewpoint())
            .rotate_vector(vec3(0.0, 0.0, -1.0));

        let mut sticks: [Option<Vector2<f32>>; 2] = [None, None];
        let mut jump_requested = false;

        for hand in Hand::BOTH {
            let index = hand.index();
            match session.sample(hand) {
                Some(sample) => {
                    self.rig.apply_pose(&mut self.graph, &sample);
                    let button_edges = self.edges[index].detect(&sample.buttons);
                    for edge in &button_edges {
                        trace!(
                            "[{}] {} {:?}",
                            hand.label(),
                            button_name(edge.index),
                            edge.transition
                        );
                    }
                    if hand == Hand::Right && button_edges.iter().any(|e| e.is_press(BUTTON_A)) {
                        jump_requested = true;
                    }

                    let hand_events = self.hands[index].update_hand(
                        &mut self.graph,
                        hand,
                        self.rig.controller(hand),
                        &button_edges,
                        &self.interactables,
                        fallback_root,
                    );
                    events.extend(hand_events.into_iter().map(ViewerEvent::Interaction));
                    sticks[index] = Some(sample.thumbstick());
                }
                None => {
                    // Loss of an input source cancels whatever it was doing.
                    self.edges[index].reset();
                    let lost = self.hands[index].source_lost(&mut self.graph, hand, fallback_root);
                    events.extend(lost.into_iter().map(ViewerEvent::Interaction));
                }
            }
        }

        let pointer_events = if immersive {
            // The pointer is a desktop-only source; a session start mid-click
            // must not leave stale hover or selection behind.
            self.pointer
                .source_lost(&mut self.graph, Hand::Right, fallback_root)
        } else {
            match &desktop.pointer {
                Some(pointer) => self.pointer.update_pointer(
                    &mut self.graph,
                    Hand::Right,
                    Some(&pointer.ray),
                    pointer.select,
                    &self.interactables,
                ),
                None => self.pointer.update_pointer(
                    &mut self.graph,
                    Hand::Right,
                    None,
                    None,
                    &self.interactables,
                ),
            }
        };
        events.extend(pointer_events.into_iter().map(ViewerEvent::Interaction));

        let target = self.rig.movement_target();
        self.locomotion
            .integrate_gravity(&mut self.graph, target, immersive);

        let jump = jump_requested || (!immersive && desktop.jump);
        if jump && self.locomotion.try_jump(&self.graph, target, immersive) {
            events.push(ViewerEvent::Jumped);
        }

        for hand in Hand::BOTH {
            if let Some(stick) = sticks[hand.index()] {
                let forward = self
                    .graph
                    .world_rotation(self.rig.controller(hand))
                    .rotate_vector(vec3(0.0, 0.0, -1.0));
                self.locomotion
                    .apply_move(&mut self.graph, target, stick, Some(forward), head_forward);
            }
        }
        if !immersive {
            self.locomotion
                .apply_move(&mut self.graph, target, desktop.move_input, None, head_forward);
        }

        events
    }
}
