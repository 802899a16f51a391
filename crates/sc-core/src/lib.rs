pub mod config;
pub mod id;
pub mod model;
pub mod scene;
pub mod shape;

pub use config::DiagramConfig;
pub use id::ShapeId;
pub use model::{
    CaptionModel, ContainerModel, DiagramModel, EdgeAttributes, GenericModel, GroupModel,
    ShapeManager, SharedShapeManager,
};
pub use scene::Scene;
pub use shape::{ChangeKind, Geometry, PathCmd, ResizeBehavior, ShapeKind, ShapeNode};

// Re-export petgraph/kurbo types so downstream crates don't need a direct dependency
pub use kurbo;
pub use petgraph::graph::NodeIndex;

/// Arena handle of a shape in a `Scene`.
pub type ShapeIndex = NodeIndex;
