pub mod graph;
pub mod ray;
pub mod util;

pub use graph::{GraphError, InteractionFlags, NodeId, NodeKind, SceneGraph, Shape};
pub use ray::{Ray, RayHit};
