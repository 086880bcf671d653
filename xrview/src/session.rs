// Desktop/immersive session transitions. Owns the player rig and moves the
// viewpoint and both controller pairs between the world root and the rig,
// preserving world transforms so the user never sees a jump. The orbit
// camera control and the 2D overlays are reached only through the traits
// below; they are presentation concerns with no other coupling to the core.

use cgmath::{vec3, Vector3, Zero};
use scene::{NodeId, NodeKind, SceneGraph};
use tracing::{info, trace, warn};

use crate::events::ModeEvent;
use crate::input::{Hand, InputSample, SessionEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentationMode {
    Desktop,
    Immersive,
}

/// Desktop-only 2D surface (debug panel, settings GUI). Hidden while a
/// headset is presenting.
pub trait Overlay {
    fn show(&mut self);
    fn hide(&mut self);
}

/// Desktop orbit-style camera control; disabled while a headset drives the
/// viewpoint.
pub trait OrbitControl {
    fn set_enabled(&mut self, enabled: bool);
}

/// Preferred standing spot when entering immersive mode: in front of a focus
/// point at a given viewing distance. When unset, the rig picks up the
/// viewpoint's current world position instead.
#[derive(Clone, Copy, Debug)]
pub struct Vantage {
    pub focus: Vector3<f32>,
    pub distance: f32,
}

/// Aim and grip nodes of one tracked controller. Both always share a parent.
#[derive(Clone, Copy, Debug)]
pub struct ControllerPair {
    pub aim: NodeId,
    pub grip: NodeId,
}

pub struct SessionRig {
    mode: PresentationMode,
    rig: NodeId,
    viewpoint: NodeId,
    controllers: [ControllerPair; 2],
    vantage: Option<Vantage>,
    neutral_rig_position: Vector3<f32>,
}

impl SessionRig {
    /// Spawns the player rig and both controller pairs under the world root;
    /// `viewpoint` is the externally created camera node.
    pub fn new(graph: &mut SceneGraph, viewpoint: NodeId) -> SessionRig {
        let rig = graph.spawn_named(NodeKind::Group, "player-rig");
        let controllers = Hand::BOTH.map(|hand| ControllerPair {
            aim: graph.spawn_named(NodeKind::Group, &format!("controller-{}", hand.label())),
            grip: graph.spawn_named(NodeKind::Group, &format!("grip-{}", hand.label())),
        });
        SessionRig {
            mode: PresentationMode::Desktop,
            rig,
            viewpoint,
            controllers,
            vantage: None,
            neutral_rig_position: Vector3::zero(),
        }
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    pub fn is_immersive(&self) -> bool {
        self.mode == PresentationMode::Immersive
    }

    pub fn rig(&self) -> NodeId {
        self.rig
    }

    pub fn viewpoint(&self) -> NodeId {
        self.viewpoint
    }

    pub fn controller(&self, hand: Hand) -> NodeId {
        self.controllers[hand.index()].aim
    }

    pub fn controller_pair(&self, hand: Hand) -> ControllerPair {
        self.controllers[hand.index()]
    }

    /// The node locomotion moves: the rig while immersive, the viewpoint
    /// itself on the desktop.
    pub fn movement_target(&self) -> NodeId {
        match self.mode {
            PresentationMode::Immersive => self.rig,
            PresentationMode::Desktop => self.viewpoint,
        }
    }

    pub fn set_vantage(&mut self, vantage: Option<Vantage>) {
        self.vantage = vantage;
    }

    /// Write one frame's tracked pose into a controller pair's local
    /// transforms.
    pub fn apply_pose(&self, graph: &mut SceneGraph, sample: &InputSample) {
        let pair = self.controllers[sample.hand.index()];
        graph.set_local_position(pair.aim, sample.position);
        graph.set_local_rotation(pair.aim, sample.rotation);
        graph.set_local_position(pair.grip, sample.position);
        graph.set_local_rotation(pair.grip, sample.rotation);
    }

    /// Apply one session edge signal. Repeated signals for the current mode
    /// are no-ops; a real transition reparents the viewpoint and controllers
    /// before anything else this frame reads the topology.
    pub fn handle_event(
        &mut self,
        graph: &mut SceneGraph,
        event: SessionEvent,
        standing_height: f32,
        orbit: &mut dyn OrbitControl,
        overlay: &mut dyn Overlay,
    ) -> Option<ModeEvent> {
        match event {
            SessionEvent::Started => {
                if self.mode == PresentationMode::Immersive {
                    trace!("session start while already immersive, ignoring");
                    return None;
                }
                self.mode = PresentationMode::Immersive;
                orbit.set_enabled(false);
                overlay.hide();

                let world = graph.world_position(self.viewpoint);
                let rig_position = match self.vantage {
                    Some(vantage) => vec3(
                        vantage.focus.x,
                        vantage.focus.y.max(standing_height),
                        vantage.focus.z + vantage.distance,
                    ),
                    None => vec3(world.x, world.y.max(standing_height), world.z),
                };
                graph.set_local_position(self.rig, rig_position);

                if let Err(err) = graph.add_child(self.rig, self.viewpoint) {
                    warn!("could not attach viewpoint to rig: {}", err);
                }
                // Local position zeroed: headset-tracked offsets compose on
                // top of the rig position.
                graph.set_local_position(self.viewpoint, Vector3::zero());
                self.move_controllers_to(graph, self.rig);

                info!(
                    "entered immersive mode, rig at ({:.1}, {:.1}, {:.1})",
                    rig_position.x, rig_position.y, rig_position.z
                );
                Some(ModeEvent::EnteredImmersive)
            }
            SessionEvent::Ended => {
                if self.mode == PresentationMode::Desktop {
                    trace!("session end while already on desktop, ignoring");
                    return None;
                }
                self.mode = PresentationMode::Desktop;

                let world = graph.world_position(self.viewpoint);
                let root = graph.root();
                if let Err(err) = graph.add_child(root, self.viewpoint) {
                    warn!("could not reattach viewpoint to world root: {}", err);
                }
                graph.set_local_position(self.viewpoint, world);
                graph.set_local_position(self.rig, self.neutral_rig_position);
                self.move_controllers_to(graph, root);

                orbit.set_enabled(true);
                overlay.show();
                info!("entered desktop mode");
                Some(ModeEvent::EnteredDesktop)
            }
        }
    }

    fn move_controllers_to(&self, graph: &mut SceneGraph, parent: NodeId) {
        for pair in self.controllers {
            if let Err(err) = graph.add_child(parent, pair.aim) {
                warn!("could not reparent controller: {}", err);
            }
            if let Err(err) = graph.add_child(parent, pair.grip) {
                warn!("could not reparent controller grip: {}", err);
            }
        }
    }
}
