// Ray targeting against a caller-supplied candidate set. Candidates may be
// composite (a group of primitives); the hit always resolves to the
// intersected primitive, never the enclosing group.

use cgmath::{InnerSpace, Point3, Quaternion, Rotation, Vector3};

use crate::graph::{NodeId, NodeKind, SceneGraph, Shape};
use crate::util::point3_to_vec3;

const AXIS_EPSILON: f32 = 1e-6;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    /// Build a ray with a normalized direction. A degenerate direction is
    /// replaced with -Z so a cast is always well-formed.
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Ray {
        let direction = if direction.magnitude2() < AXIS_EPSILON {
            Vector3::new(0.0, 0.0, -1.0)
        } else {
            direction.normalize()
        };
        Ray { origin, direction }
    }

    pub fn point_at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction * distance
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    pub node: NodeId,
    pub point: Point3<f32>,
    pub distance: f32,
}

impl SceneGraph {
    /// Nearest intersection of `ray` with the candidate set, searching each
    /// candidate's subtree. Equal distances keep the earlier candidate.
    pub fn intersect(&self, ray: &Ray, candidates: &[NodeId]) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for candidate in candidates {
            self.intersect_subtree(ray, *candidate, &mut best);
        }
        best
    }

    fn intersect_subtree(&self, ray: &Ray, id: NodeId, best: &mut Option<RayHit>) {
        // Stale candidates are a legitimate steady state, not an error.
        let Some(kind) = self.kind(id) else {
            return;
        };

        if let NodeKind::Renderable { shape, .. } = kind {
            let (position, rotation) = self
                .world_transform(id)
                .unwrap_or_else(|| (Vector3::new(0.0, 0.0, 0.0), identity()));
            if let Some(distance) = intersect_shape(ray, *shape, position, rotation) {
                let closer = best.as_ref().map_or(true, |b| distance < b.distance);
                if closer {
                    *best = Some(RayHit {
                        node: id,
                        point: ray.point_at(distance),
                        distance,
                    });
                }
            }
        }

        for child in self.children(id) {
            self.intersect_subtree(ray, *child, best);
        }
    }
}

fn identity() -> Quaternion<f32> {
    Quaternion {
        v: Vector3::new(0.0, 0.0, 0.0),
        s: 1.0,
    }
}

/// Distance along `ray` to the shape placed at `position`/`rotation`, if any.
fn intersect_shape(
    ray: &Ray,
    shape: Shape,
    position: Vector3<f32>,
    rotation: Quaternion<f32>,
) -> Option<f32> {
    // Cast in the shape's local frame.
    let inverse = rotation.invert();
    let origin = inverse.rotate_vector(point3_to_vec3(ray.origin) - position);
    let direction = inverse.rotate_vector(ray.direction);

    match shape {
        Shape::Sphere { radius } => intersect_sphere(origin, direction, radius),
        Shape::Cuboid { half_extents } => intersect_cuboid(origin, direction, half_extents),
    }
}

fn intersect_sphere(origin: Vector3<f32>, direction: Vector3<f32>, radius: f32) -> Option<f32> {
    let b = origin.dot(direction);
    let c = origin.magnitude2() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt = discriminant.sqrt();
    let near = -b - sqrt;
    if near >= 0.0 {
        return Some(near);
    }
    // Origin inside the sphere: the exit point still counts as a hit.
    let far = -b + sqrt;
    (far >= 0.0).then_some(far)
}

fn intersect_cuboid(
    origin: Vector3<f32>,
    direction: Vector3<f32>,
    half_extents: Vector3<f32>,
) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        let extent = half_extents[axis];
        if d.abs() < AXIS_EPSILON {
            if o.abs() > extent {
                return None;
            }
            continue;
        }
        let t1 = (-extent - o) / d;
        let t2 = (extent - o) / d;
        let (near, far) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        t_min = t_min.max(near);
        t_max = t_max.min(far);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{InteractionFlags, NodeKind, Shape};
    use cgmath::{point3, vec3, Deg, Rotation3};

    fn cube(half: f32) -> NodeKind {
        NodeKind::mesh(Shape::Cuboid {
            half_extents: vec3(half, half, half),
        })
    }

    #[test]
    fn test_sphere_hit_distance_and_point() {
        let mut graph = SceneGraph::new();
        let sphere = graph.spawn(NodeKind::mesh(Shape::Sphere { radius: 1.0 }));
        graph.set_local_position(sphere, vec3(0.0, 0.0, -5.0));

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        let hit = graph.intersect(&ray, &[sphere]).unwrap();

        assert_eq!(hit.node, sphere);
        assert!((hit.distance - 4.0).abs() < 1e-5);
        assert!((hit.point.z - -4.0).abs() < 1e-5);
    }

    #[test]
    fn test_miss_returns_none() {
        let mut graph = SceneGraph::new();
        let sphere = graph.spawn(NodeKind::mesh(Shape::Sphere { radius: 0.5 }));
        graph.set_local_position(sphere, vec3(10.0, 0.0, -5.0));

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        assert!(graph.intersect(&ray, &[sphere]).is_none());
    }

    #[test]
    fn test_nearest_candidate_wins() {
        let mut graph = SceneGraph::new();
        let far = graph.spawn(cube(0.5));
        graph.set_local_position(far, vec3(0.0, 0.0, -8.0));
        let near = graph.spawn(cube(0.5));
        graph.set_local_position(near, vec3(0.0, 0.0, -3.0));

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        let hit = graph.intersect(&ray, &[far, near]).unwrap();
        assert_eq!(hit.node, near);
    }

    #[test]
    fn test_equal_distance_keeps_candidate_order() {
        let mut graph = SceneGraph::new();
        let first = graph.spawn(cube(0.5));
        graph.set_local_position(first, vec3(0.0, 0.0, -3.0));
        let second = graph.spawn(cube(0.5));
        graph.set_local_position(second, vec3(0.0, 0.0, -3.0));

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        assert_eq!(graph.intersect(&ray, &[first, second]).unwrap().node, first);
        assert_eq!(
            graph.intersect(&ray, &[second, first]).unwrap().node,
            second
        );
    }

    #[test]
    fn test_composite_candidate_resolves_to_primitive() {
        let mut graph = SceneGraph::new();
        let assembly = graph.spawn(NodeKind::Group);
        let part = graph.spawn(cube(0.5));
        graph.add_child(assembly, part).unwrap();
        graph.set_local_position(assembly, vec3(0.0, 0.0, -4.0));

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        let hit = graph.intersect(&ray, &[assembly]).unwrap();
        assert_eq!(hit.node, part);
    }

    #[test]
    fn test_rotated_cuboid_uses_oriented_bounds() {
        let mut graph = SceneGraph::new();
        let slab = graph.spawn(NodeKind::Renderable {
            shape: Shape::Cuboid {
                half_extents: vec3(2.0, 0.1, 0.1),
            },
            flags: InteractionFlags::SELECTABLE,
        });
        graph.set_local_position(slab, vec3(0.0, 0.0, -3.0));
        graph.set_local_rotation(slab, Quaternion::from_angle_y(Deg(90.0)));

        // After the yaw, the long axis lies along Z; a ray off to the side of
        // the unrotated extents must now hit.
        let ray = Ray::new(point3(0.0, 0.0, -1.5), vec3(0.0, 0.0, -1.0));
        assert!(graph.intersect(&ray, &[slab]).is_some());

        let side_ray = Ray::new(point3(1.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        assert!(graph.intersect(&side_ray, &[slab]).is_none());
    }

    #[test]
    fn test_stale_candidate_is_skipped() {
        let mut graph = SceneGraph::new();
        let sphere = graph.spawn(NodeKind::mesh(Shape::Sphere { radius: 1.0 }));
        graph.set_local_position(sphere, vec3(0.0, 0.0, -5.0));
        let ghost = graph.spawn(cube(0.5));
        graph.despawn(ghost);

        let ray = Ray::new(point3(0.0, 0.0, 0.0), vec3(0.0, 0.0, -1.0));
        let hit = graph.intersect(&ray, &[ghost, sphere]).unwrap();
        assert_eq!(hit.node, sphere);
    }
}
