use cgmath::{point3, vec3, Point3, Vector3};

pub fn vec3_to_point3(v: Vector3<f32>) -> Point3<f32> {
    point3(v.x, v.y, v.z)
}

pub fn point3_to_vec3(p: Point3<f32>) -> Vector3<f32> {
    vec3(p.x, p.y, p.z)
}
