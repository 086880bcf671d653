// Shared locomotion model: gravity, jump impulses, thumbstick-driven
// horizontal movement, and the ground/boundary clamps. Both presentation
// modes funnel through the same integrator; only the movement target (rig or
// viewpoint) differs.

use cgmath::{vec3, InnerSpace, Vector2, Vector3};
use scene::{NodeId, SceneGraph};
use tracing::{trace, warn};

const FLAT_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug)]
pub struct MovementSettings {
    /// Per-frame velocity increment, negative is down.
    pub gravity: f32,
    pub jump_impulse: f32,
    pub move_speed: f32,
    pub deadzone: f32,
    /// Standing eye height; the rig never sinks below it while immersive.
    pub player_height: f32,
}

impl Default for MovementSettings {
    fn default() -> MovementSettings {
        MovementSettings {
            gravity: -0.02,
            jump_impulse: 0.25,
            move_speed: 0.15,
            deadzone: 0.2,
            player_height: 1.6,
        }
    }
}

/// Axis-aligned horizontal movement bounds.
#[derive(Clone, Copy, Debug)]
pub struct Boundary {
    pub min_x: f32,
    pub max_x: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl Boundary {
    /// Swapped bounds are a configuration mistake, normalized here rather
    /// than propagated as a fault.
    pub fn new(min_x: f32, max_x: f32, min_z: f32, max_z: f32) -> Boundary {
        if min_x > max_x || min_z > max_z {
            warn!("boundary has swapped bounds, normalizing");
        }
        Boundary {
            min_x: min_x.min(max_x),
            max_x: min_x.max(max_x),
            min_z: min_z.min(max_z),
            max_z: min_z.max(max_z),
        }
    }

    fn clamp(&self, position: &mut Vector3<f32>) {
        position.x = position.x.max(self.min_x).min(self.max_x);
        position.z = position.z.max(self.min_z).min(self.max_z);
    }
}

pub struct Locomotion {
    settings: MovementSettings,
    vertical_velocity: f32,
    ground_level: f32,
    boundary: Option<Boundary>,
    movement_enabled: bool,
}

impl Locomotion {
    pub fn new(settings: MovementSettings) -> Locomotion {
        Locomotion {
            settings,
            vertical_velocity: 0.0,
            ground_level: 0.0,
            boundary: None,
            movement_enabled: true,
        }
    }

    pub fn settings(&self) -> &MovementSettings {
        &self.settings
    }

    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    pub fn movement_enabled(&self) -> bool {
        self.movement_enabled
    }

    pub fn set_movement_enabled(&mut self, enabled: bool) {
        self.movement_enabled = enabled;
    }

    pub fn set_ground_level(&mut self, level: f32) {
        self.ground_level = level;
    }

    pub fn set_boundary(&mut self, boundary: Option<Boundary>) {
        if let Some(b) = &boundary {
            trace!(
                "movement boundary set: x [{:.1}, {:.1}], z [{:.1}, {:.1}]",
                b.min_x,
                b.max_x,
                b.min_z,
                b.max_z
            );
        }
        self.boundary = boundary;
    }

    /// Non-positive heights are cosmetic nonsense; floor at zero. While
    /// immersive the target is lifted immediately so the viewpoint does not
    /// stay sunken until the next jump.
    pub fn set_player_height(
        &mut self,
        height: f32,
        graph: &mut SceneGraph,
        target: NodeId,
        immersive: bool,
    ) {
        if height < 0.0 {
            warn!("player height {} clamped to 0", height);
        }
        self.settings.player_height = height.max(0.0);
        if immersive {
            let minimum = self.effective_ground_level(true);
            let mut position = graph.local_position(target);
            if position.y < minimum {
                position.y = minimum;
                graph.set_local_position(target, position);
            }
        }
    }

    /// Configured ground level, raised to standing height while immersive.
    pub fn effective_ground_level(&self, immersive: bool) -> f32 {
        if immersive {
            self.ground_level.max(self.settings.player_height)
        } else {
            self.ground_level
        }
    }

    /// Per-frame vertical step: accumulate gravity, move, clamp to ground.
    pub fn integrate_gravity(&mut self, graph: &mut SceneGraph, target: NodeId, immersive: bool) {
        let minimum = self.effective_ground_level(immersive);
        self.vertical_velocity += self.settings.gravity;
        let mut position = graph.local_position(target);
        position.y += self.vertical_velocity;
        if position.y < minimum {
            position.y = minimum;
            self.vertical_velocity = 0.0;
        }
        graph.set_local_position(target, position);
    }

    /// Jump only fires from the ground (or below it, after a clamp).
    pub fn try_jump(&mut self, graph: &SceneGraph, target: NodeId, immersive: bool) -> bool {
        let minimum = self.effective_ground_level(immersive);
        if graph.local_position(target).y <= minimum {
            self.vertical_velocity = self.settings.jump_impulse;
            true
        } else {
            false
        }
    }

    /// Horizontal movement along the issuing controller's forward (or the
    /// head's, or -Z as a last resort), with the perpendicular as strafe.
    /// The resulting X/Z are clamped into the boundary, not rejected, so
    /// movement along an unblocked axis survives.
    pub fn apply_move(
        &mut self,
        graph: &mut SceneGraph,
        target: NodeId,
        stick: Vector2<f32>,
        forward_hint: Option<Vector3<f32>>,
        head_forward: Vector3<f32>,
    ) {
        if !self.movement_enabled {
            return;
        }
        let input = self.deadzoned(stick);
        if input.x == 0.0 && input.y == 0.0 {
            return;
        }

        let direction = horizontal_direction(forward_hint, head_forward);
        let strafe = vec3(-direction.z, 0.0, direction.x);
        let speed = self.settings.move_speed;

        let mut position = graph.local_position(target);
        position += direction * (input.y * speed) + strafe * (-input.x * speed);
        if let Some(boundary) = &self.boundary {
            boundary.clamp(&mut position);
        }
        graph.set_local_position(target, position);
    }

    /// Per-axis deadzone, then a cap at unit magnitude so diagonals are not
    /// faster than straight lines. Partial deflection is preserved.
    fn deadzoned(&self, stick: Vector2<f32>) -> Vector2<f32> {
        let deadzone = self.settings.deadzone;
        let mut input = Vector2::new(
            if stick.x.abs() > deadzone { stick.x } else { 0.0 },
            if stick.y.abs() > deadzone { stick.y } else { 0.0 },
        );
        let magnitude = input.magnitude();
        if magnitude > 1.0 {
            input /= magnitude;
        }
        input
    }
}

/// Flatten a forward vector into the horizontal plane. Near-vertical vectors
/// are degenerate after flattening; fall through to the next candidate.
fn horizontal_direction(hint: Option<Vector3<f32>>, head: Vector3<f32>) -> Vector3<f32> {
    for candidate in [hint, Some(head)].into_iter().flatten() {
        let flat = vec3(candidate.x, 0.0, candidate.z);
        if flat.magnitude2() >= FLAT_EPSILON {
            return flat.normalize();
        }
    }
    vec3(0.0, 0.0, -1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::NodeKind;

    fn setup() -> (SceneGraph, NodeId, Locomotion) {
        let mut graph = SceneGraph::new();
        let target = graph.spawn_named(NodeKind::Group, "target");
        (graph, target, Locomotion::new(MovementSettings::default()))
    }

    #[test]
    fn test_ground_clamp_settles_and_never_undershoots() {
        let (mut graph, target, mut locomotion) = setup();
        graph.set_local_position(target, vec3(0.0, 10.0, 0.0));

        for _ in 0..200 {
            locomotion.integrate_gravity(&mut graph, target, false);
            assert!(graph.local_position(target).y >= 0.0);
        }

        assert_eq!(graph.local_position(target).y, 0.0);
        assert_eq!(locomotion.vertical_velocity(), 0.0);
    }

    #[test]
    fn test_immersive_ground_is_standing_height() {
        let (mut graph, target, mut locomotion) = setup();
        graph.set_local_position(target, vec3(0.0, 10.0, 0.0));

        for _ in 0..200 {
            locomotion.integrate_gravity(&mut graph, target, true);
        }

        assert_eq!(graph.local_position(target).y, 1.6);
    }

    #[test]
    fn test_jump_only_from_ground() {
        let (mut graph, target, mut locomotion) = setup();

        assert!(locomotion.try_jump(&graph, target, false));
        locomotion.integrate_gravity(&mut graph, target, false);
        assert!(graph.local_position(target).y > 0.0);

        // Airborne: a second jump is refused.
        assert!(!locomotion.try_jump(&graph, target, false));

        for _ in 0..200 {
            locomotion.integrate_gravity(&mut graph, target, false);
        }
        assert_eq!(graph.local_position(target).y, 0.0);
        assert!(locomotion.try_jump(&graph, target, false));
    }

    #[test]
    fn test_boundary_clamps_but_does_not_reject() {
        let (mut graph, target, mut locomotion) = setup();
        locomotion.set_boundary(Some(Boundary::new(-5.0, 5.0, -5.0, 5.0)));

        // Full forward along -Z converges to the edge and stays there.
        for _ in 0..100 {
            locomotion.apply_move(
                &mut graph,
                target,
                Vector2::new(0.0, 1.0),
                None,
                vec3(0.0, 0.0, -1.0),
            );
            assert!(graph.local_position(target).z >= -5.0);
        }
        assert_eq!(graph.local_position(target).z, -5.0);

        // Sliding along X still works while pinned against the Z edge.
        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(1.0, 1.0),
            None,
            vec3(0.0, 0.0, -1.0),
        );
        assert!(graph.local_position(target).x < 0.0);
        assert_eq!(graph.local_position(target).z, -5.0);
    }

    #[test]
    fn test_deadzone_swallows_drift() {
        let (mut graph, target, mut locomotion) = setup();

        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(0.1, 0.15),
            None,
            vec3(0.0, 0.0, -1.0),
        );
        assert_eq!(graph.local_position(target), vec3(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_diagonal_speed_is_capped() {
        let (mut graph, target, mut locomotion) = setup();

        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(1.0, 1.0),
            None,
            vec3(0.0, 0.0, -1.0),
        );
        let moved = graph.local_position(target).magnitude();
        assert!((moved - 0.15).abs() < 1e-5, "moved {}", moved);
    }

    #[test]
    fn test_degenerate_forward_falls_back() {
        let (mut graph, target, mut locomotion) = setup();

        // Controller pointing straight down: use the head's forward.
        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(0.0, 1.0),
            Some(vec3(0.0, -1.0, 0.0)),
            vec3(1.0, 0.0, 0.0),
        );
        let position = graph.local_position(target);
        assert!((position.x - 0.15).abs() < 1e-5);
        assert!(position.z.abs() < 1e-6);

        // Head degenerate too: -Z as the last resort.
        graph.set_local_position(target, vec3(0.0, 0.0, 0.0));
        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(0.0, 1.0),
            Some(vec3(0.0, -1.0, 0.0)),
            vec3(0.0, 1.0, 0.0),
        );
        assert!((graph.local_position(target).z - -0.15).abs() < 1e-5);
    }

    #[test]
    fn test_movement_can_be_disabled() {
        let (mut graph, target, mut locomotion) = setup();
        locomotion.set_movement_enabled(false);

        locomotion.apply_move(
            &mut graph,
            target,
            Vector2::new(0.0, 1.0),
            None,
            vec3(0.0, 0.0, -1.0),
        );
        assert_eq!(graph.local_position(target), vec3(0.0, 0.0, 0.0));
        assert!(!locomotion.movement_enabled());
    }

    #[test]
    fn test_swapped_boundary_is_normalized() {
        let boundary = Boundary::new(5.0, -5.0, 2.0, -2.0);
        assert_eq!(boundary.min_x, -5.0);
        assert_eq!(boundary.max_x, 5.0);
        assert_eq!(boundary.min_z, -2.0);
        assert_eq!(boundary.max_z, 2.0);
    }

    #[test]
    fn test_player_height_floors_at_zero_and_lifts_target() {
        let (mut graph, target, mut locomotion) = setup();

        locomotion.set_player_height(-2.0, &mut graph, target, false);
        assert_eq!(locomotion.settings().player_height, 0.0);
        assert_eq!(locomotion.effective_ground_level(true), 0.0);

        // Raising the height while immersive lifts a sunken target at once.
        locomotion.set_player_height(1.8, &mut graph, target, true);
        assert_eq!(graph.local_position(target).y, 1.8);
    }
}
