// Headless demo driver. Plays a scripted user through both presentation
// modes: desktop pointer and keyboard movement first, then an immersive
// session with grabbing, thumbstick locomotion and a jump, then back to the
// desktop. Rendering and windowing are out of scope; every semantic event
// the core emits is logged instead.

use std::collections::VecDeque;
use std::time::Instant;

use cgmath::{vec2, vec3, InnerSpace, Vector3};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scene::util::vec3_to_point3;
use scene::{NodeId, NodeKind, Ray, SceneGraph, Shape};
use xrview::edge::Transition;
use xrview::input::{ButtonState, BUTTON_A, BUTTON_SQUEEZE, BUTTON_TRIGGER};
use xrview::time::Time;
use xrview::{
    DesktopInput, Hand, InputSample, InteractionEvent, ModeEvent, MovementSettings, OrbitControl,
    Overlay, PointerInput, SessionEvent, Vantage, Viewer, ViewerEvent, ViewerOptions, XrSession,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of frames to simulate
    #[arg(short, long, default_value_t = 300)]
    frames: u32,

    /// Standing eye height in meters
    #[arg(long, default_value_t = 1.6)]
    player_height: f32,

    /// Half-extent of the square movement boundary; omit for unbounded
    #[arg(long)]
    boundary: Option<f32>,

    /// Enter immersive mode at the model vantage instead of in place
    #[arg(long)]
    vantage: bool,
}

/// Stand-in for the desktop orbit camera control.
struct DesktopOrbit {
    enabled: bool,
}

impl OrbitControl for DesktopOrbit {
    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            info!(
                "orbit control {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }
}

/// Stand-in for the desktop debug overlay.
struct DebugOverlay {
    visible: bool,
}

impl Overlay for DebugOverlay {
    fn show(&mut self) {
        if !self.visible {
            self.visible = true;
            info!("overlay shown");
        }
    }

    fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            info!("overlay hidden");
        }
    }
}

/// Scripted XR session: presents between two fixed frames and synthesizes
/// controller samples for a canned sequence of grab, select, jump and
/// thumbstick movement.
struct ScriptedSession {
    frame: u32,
    start_frame: u32,
    end_frame: u32,
    presenting: bool,
    pending: VecDeque<SessionEvent>,
}

impl ScriptedSession {
    fn new(start_frame: u32, end_frame: u32) -> ScriptedSession {
        ScriptedSession {
            frame: 0,
            start_frame,
            end_frame,
            presenting: false,
            pending: VecDeque::new(),
        }
    }

    fn advance(&mut self, frame: u32) {
        self.frame = frame;
        if frame == self.start_frame {
            self.pending.push_back(SessionEvent::Started);
            self.presenting = true;
        }
        if frame == self.end_frame {
            self.pending.push_back(SessionEvent::Ended);
            self.presenting = false;
        }
    }
}

fn held(range: std::ops::RangeInclusive<u32>, frame: u32) -> ButtonState {
    let pressed = range.contains(&frame);
    ButtonState {
        pressed,
        touched: pressed,
        value: if pressed { 1.0 } else { 0.0 },
    }
}

impl XrSession for ScriptedSession {
    fn poll_event(&mut self) -> Option<SessionEvent> {
        self.pending.pop_front()
    }

    fn sample(&self, hand: Hand) -> Option<InputSample> {
        if !self.presenting {
            return None;
        }
        let frame = self.frame;
        let mut sample = InputSample::new(hand);
        sample.position = match hand {
            Hand::Left => vec3(-0.2, -0.35, -0.25),
            Hand::Right => vec3(0.2, -0.35, -0.25),
        };

        let mut buttons = vec![ButtonState::default(); 6];
        match hand {
            Hand::Right => {
                buttons[BUTTON_SQUEEZE] = held(60..=110, frame);
                buttons[BUTTON_TRIGGER] = held(130..=140, frame);
                buttons[BUTTON_A] = held(160..=165, frame);
                let forward = if (180..=210).contains(&frame) { 0.8 } else { 0.0 };
                sample.axes = vec![0.0, 0.0, 0.0, forward];
            }
            Hand::Left => {
                let strafe = if (190..=200).contains(&frame) { 0.5 } else { 0.0 };
                sample.axes = vec![0.0, 0.0, strafe, 0.0];
            }
        }
        sample.buttons = buttons;
        Some(sample)
    }
}

/// A small inspection scene: a composite model assembly plus two loose
/// crates, all interactable.
fn build_scene(graph: &mut SceneGraph) -> (Vec<NodeId>, Vector3<f32>) {
    let model_center = vec3(0.0, 1.2, -6.0);

    let assembly = graph.spawn_named(NodeKind::Group, "model");
    graph.set_local_position(assembly, model_center);

    let housing = graph.spawn_named(
        NodeKind::mesh(Shape::Cuboid {
            half_extents: vec3(0.8, 0.6, 0.6),
        }),
        "housing",
    );
    let _ = graph.add_child(assembly, housing);

    let probe = graph.spawn_named(NodeKind::mesh(Shape::Sphere { radius: 0.3 }), "probe");
    graph.set_local_position(probe, vec3(0.0, 0.9, 0.0));
    let _ = graph.add_child(assembly, probe);

    let crate_a = graph.spawn_named(
        NodeKind::mesh(Shape::Cuboid {
            half_extents: vec3(0.4, 0.4, 0.4),
        }),
        "crate-a",
    );
    graph.set_local_position(crate_a, vec3(-2.5, 0.4, -4.0));

    let crate_b = graph.spawn_named(
        NodeKind::mesh(Shape::Cuboid {
            half_extents: vec3(0.4, 0.4, 0.4),
        }),
        "crate-b",
    );
    graph.set_local_position(crate_b, vec3(2.5, 0.4, -4.0));

    (vec![assembly, crate_a, crate_b], model_center)
}

/// Desktop-phase input: an early jump, a pointer click on the model, a short
/// keyboard walk. All of it is ignored by the core while immersive.
fn desktop_input(frame: u32, viewer: &Viewer, model_center: Vector3<f32>) -> DesktopInput {
    let mut input = DesktopInput {
        jump: frame == 5,
        ..DesktopInput::default()
    };

    if (10..=40).contains(&frame) {
        let origin = viewer.graph().world_position(viewer.viewpoint());
        let direction = model_center - origin;
        if direction.magnitude2() > 1e-6 {
            input.pointer = Some(PointerInput {
                ray: Ray::new(vec3_to_point3(origin), direction),
                select: match frame {
                    12 => Some(Transition::Pressed),
                    14 => Some(Transition::Released),
                    _ => None,
                },
            });
        }
    }

    if (16..=24).contains(&frame) {
        input.move_input = vec2(0.0, 1.0);
    }

    input
}

fn node_label(graph: &SceneGraph, node: NodeId) -> String {
    graph.name(node).unwrap_or("<unnamed>").to_owned()
}

fn log_event(frame: u32, graph: &SceneGraph, event: &ViewerEvent) {
    match event {
        ViewerEvent::Mode(ModeEvent::EnteredImmersive) => {
            info!("[frame {frame}] entered immersive mode")
        }
        ViewerEvent::Mode(ModeEvent::EnteredDesktop) => {
            info!("[frame {frame}] entered desktop mode")
        }
        ViewerEvent::Jumped => info!("[frame {frame}] jump"),
        ViewerEvent::Interaction(interaction) => match interaction {
            InteractionEvent::HoverChanged { hand, node, .. } => match node {
                Some(node) => info!(
                    "[frame {frame}] [{}] hovering {}",
                    hand.label(),
                    node_label(graph, *node)
                ),
                None => info!("[frame {frame}] [{}] hover cleared", hand.label()),
            },
            InteractionEvent::SelectStart { hand, node, point } => info!(
                "[frame {frame}] [{}] selected {} at ({:.2}, {:.2}, {:.2})",
                hand.label(),
                node_label(graph, *node),
                point.x,
                point.y,
                point.z
            ),
            InteractionEvent::SelectEnd { hand } => {
                info!("[frame {frame}] [{}] select ended", hand.label())
            }
            InteractionEvent::GrabStart { hand, node, .. } => info!(
                "[frame {frame}] [{}] grabbed {}",
                hand.label(),
                node_label(graph, *node)
            ),
            InteractionEvent::GrabEnd { hand, node } => info!(
                "[frame {frame}] [{}] released {}",
                hand.label(),
                node_label(graph, *node)
            ),
        },
    }
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut viewer = Viewer::new(ViewerOptions {
        movement: MovementSettings {
            player_height: args.player_height,
            ..MovementSettings::default()
        },
        boundary: args
            .boundary
            .map(|extent| xrview::Boundary::new(-extent, extent, -extent, extent)),
        initial_viewpoint: vec3(0.0, 1.6, 4.0),
        vantage: None,
    });

    let (interactables, model_center) = build_scene(viewer.graph_mut());
    viewer.set_interactables(interactables);
    if args.vantage {
        viewer.set_vantage(Some(Vantage {
            focus: model_center,
            distance: 4.0,
        }));
    }

    let mut session = ScriptedSession::new(50, 240);
    let mut orbit = DesktopOrbit { enabled: true };
    let mut overlay = DebugOverlay { visible: true };

    info!(
        "simulating {} frames (immersive between frames 50 and 240)",
        args.frames
    );

    let start = Instant::now();
    let mut last = start;
    for frame in 0..args.frames {
        session.advance(frame);
        let now = Instant::now();
        let time = Time {
            elapsed: now - last,
            total: now - start,
        };
        last = now;

        let desktop = desktop_input(frame, &viewer, model_center);
        let events = viewer.update(&time, &mut session, &desktop, &mut orbit, &mut overlay);
        for event in &events {
            log_event(frame, viewer.graph(), event);
        }
    }

    let final_position = viewer.graph().world_position(viewer.viewpoint());
    info!(
        "done after {} frames, viewpoint at ({:.2}, {:.2}, {:.2})",
        args.frames, final_position.x, final_position.y, final_position.z
    );
}
