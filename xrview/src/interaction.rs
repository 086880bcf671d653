// Per-hand hover/select/grab state machine. Converts edge-detected button
// transitions plus ray targeting into semantic events, and owns the
// reparenting side effects of grabbing and releasing.

use cgmath::{vec3, Rotation};
use scene::util::vec3_to_point3;
use scene::{InteractionFlags, NodeId, Ray, SceneGraph};
use tracing::{trace, warn};

use crate::edge::{ButtonEdge, Transition};
use crate::events::InteractionEvent;
use crate::input::{Hand, BUTTON_SQUEEZE, BUTTON_TRIGGER};

/// A grab in flight. The previous parent is recorded at grab time so release
/// can restore it even if the interactable set changes underneath us.
struct Grab {
    node: NodeId,
    prev_parent: NodeId,
}

#[derive(Default)]
pub(crate) struct InteractionState {
    hovered: Option<NodeId>,
    grabbed: Option<Grab>,
    selecting: bool,
}

/// Aim ray of a controller node: its world position along its local -Z.
pub(crate) fn controller_ray(graph: &SceneGraph, controller: NodeId) -> Ray {
    let origin = vec3_to_point3(graph.world_position(controller));
    let direction = graph
        .world_rotation(controller)
        .rotate_vector(vec3(0.0, 0.0, -1.0));
    Ray::new(origin, direction)
}

impl InteractionState {
    pub(crate) fn grabbed_node(&self) -> Option<NodeId> {
        self.grabbed.as_ref().map(|g| g.node)
    }

    pub(crate) fn hovered_node(&self) -> Option<NodeId> {
        self.hovered
    }

    pub(crate) fn is_selecting(&self) -> bool {
        self.selecting
    }

    /// One frame of a tracked controller: hover re-cast, then the frame's
    /// button edges in order.
    pub(crate) fn update_hand(
        &mut self,
        graph: &mut SceneGraph,
        hand: Hand,
        controller: NodeId,
        edges: &[ButtonEdge],
        interactables: &[NodeId],
        fallback_root: NodeId,
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        let ray = controller_ray(graph, controller);

        self.update_hover(graph, hand, &ray, interactables, &mut events);

        for edge in edges {
            if edge.is_press(BUTTON_TRIGGER) {
                self.select_start(graph, hand, &ray, interactables, &mut events);
            } else if edge.is_release(BUTTON_TRIGGER) {
                self.select_end(hand, &mut events);
            } else if edge.is_press(BUTTON_SQUEEZE) {
                self.grab_start(graph, hand, &ray, interactables, controller, &mut events);
            } else if edge.is_release(BUTTON_SQUEEZE) {
                self.release_grab(graph, hand, fallback_root, &mut events);
            }
        }

        events
    }

    /// Desktop pointer path: same hover and select semantics, driven by an
    /// externally supplied ray. Grabbing needs a controller node to reparent
    /// to, so the pointer never grabs.
    pub(crate) fn update_pointer(
        &mut self,
        graph: &mut SceneGraph,
        hand: Hand,
        ray: Option<&Ray>,
        select: Option<Transition>,
        interactables: &[NodeId],
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();

        match ray {
            Some(ray) => {
                self.update_hover(graph, hand, ray, interactables, &mut events);
                match select {
                    Some(Transition::Pressed) => {
                        self.select_start(graph, hand, ray, interactables, &mut events)
                    }
                    Some(Transition::Released) => self.select_end(hand, &mut events),
                    None => {}
                }
            }
            None => {
                self.clear_hover(hand, &mut events);
                if select == Some(Transition::Released) {
                    self.select_end(hand, &mut events);
                }
            }
        }

        events
    }

    /// The input source vanished. Whatever it held is released immediately;
    /// an object must never stay attached to a controller that is gone.
    pub(crate) fn source_lost(
        &mut self,
        graph: &mut SceneGraph,
        hand: Hand,
        fallback_root: NodeId,
    ) -> Vec<InteractionEvent> {
        let mut events = Vec::new();
        self.release_grab(graph, hand, fallback_root, &mut events);
        self.clear_hover(hand, &mut events);
        self.select_end(hand, &mut events);
        events
    }

    fn update_hover(
        &mut self,
        graph: &SceneGraph,
        hand: Hand,
        ray: &Ray,
        interactables: &[NodeId],
        events: &mut Vec<InteractionEvent>,
    ) {
        let hit = graph.intersect(ray, interactables);
        let target = hit.as_ref().map(|h| h.node);
        if target != self.hovered {
            self.hovered = target;
            events.push(InteractionEvent::HoverChanged {
                hand,
                node: target,
                point: hit.map(|h| h.point),
            });
        }
    }

    fn clear_hover(&mut self, hand: Hand, events: &mut Vec<InteractionEvent>) {
        if self.hovered.take().is_some() {
            events.push(InteractionEvent::HoverChanged {
                hand,
                node: None,
                point: None,
            });
        }
    }

    fn select_start(
        &mut self,
        graph: &SceneGraph,
        hand: Hand,
        ray: &Ray,
        interactables: &[NodeId],
        events: &mut Vec<InteractionEvent>,
    ) {
        self.selecting = true;
        let Some(hit) = graph.intersect(ray, interactables) else {
            return;
        };
        let flags = graph.kind(hit.node).map(|k| k.flags());
        if !flags.map_or(false, |f| f.contains(InteractionFlags::SELECTABLE)) {
            trace!("[{}] select hit non-selectable {:?}", hand.label(), hit.node);
            return;
        }
        events.push(InteractionEvent::SelectStart {
            hand,
            node: hit.node,
            point: hit.point,
        });
    }

    fn select_end(&mut self, hand: Hand, events: &mut Vec<InteractionEvent>) {
        if self.selecting {
            self.selecting = false;
            events.push(InteractionEvent::SelectEnd { hand });
        }
    }

    fn grab_start(
        &mut self,
        graph: &mut SceneGraph,
        hand: Hand,
        ray: &Ray,
        interactables: &[NodeId],
        controller: NodeId,
        events: &mut Vec<InteractionEvent>,
    ) {
        if self.grabbed.is_some() {
            // Already holding something.
            return;
        }
        let Some(hit) = graph.intersect(ray, interactables) else {
            return;
        };
        let flags = graph.kind(hit.node).map(|k| k.flags());
        if !flags.map_or(false, |f| f.contains(InteractionFlags::GRABBABLE)) {
            trace!("[{}] grab hit non-grabbable {:?}", hand.label(), hit.node);
            return;
        }

        let prev_parent = graph
            .parent(hit.node)
            .unwrap_or_else(|| graph.top_level_ancestor(hit.node));
        match graph.attach_preserving_world(hit.node, controller) {
            Ok(()) => {
                self.grabbed = Some(Grab {
                    node: hit.node,
                    prev_parent,
                });
                events.push(InteractionEvent::GrabStart {
                    hand,
                    node: hit.node,
                    point: hit.point,
                });
            }
            Err(err) => warn!("[{}] grab failed: {}", hand.label(), err),
        }
    }

    fn release_grab(
        &mut self,
        graph: &mut SceneGraph,
        hand: Hand,
        fallback_root: NodeId,
        events: &mut Vec<InteractionEvent>,
    ) {
        let Some(grab) = self.grabbed.take() else {
            return;
        };
        if !graph.contains(grab.node) {
            // The held object was removed from the scene out from under us.
            trace!("[{}] grabbed node vanished before release", hand.label());
            return;
        }

        let restore = if graph.contains(grab.prev_parent) {
            grab.prev_parent
        } else {
            fallback_root
        };
        if let Err(err) = graph.attach_preserving_world(grab.node, restore) {
            warn!(
                "[{}] release could not restore parent ({}), falling back to world root",
                hand.label(),
                err
            );
            if let Err(err) = graph.attach_preserving_world(grab.node, graph.root()) {
                warn!("[{}] release failed outright: {}", hand.label(), err);
            }
        }
        events.push(InteractionEvent::GrabEnd {
            hand,
            node: grab.node,
        });
    }
}
