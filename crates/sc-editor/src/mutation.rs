//! Reversible scene mutations.
//!
//! Every edit the editor makes goes through a `SceneMutation`, addressed by
//! `ShapeId` so it stays valid across undo/redo. `apply_mutation` is the
//! single entry point into the scene's container operations.

use kurbo::{Size, Vec2};
use sc_core::{EdgeAttributes, Scene, ShapeId, ShapeKind};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneMutation {
    /// Attach `child` to `parent`, detaching it from its current parent.
    /// `edge`, when given, is applied to the new edge.
    AddChild {
        parent: ShapeId,
        child: ShapeId,
        edge: Option<EdgeAttributes>,
    },
    RemoveChild {
        parent: ShapeId,
        child: ShapeId,
    },
    MoveShape {
        id: ShapeId,
        dx: f64,
        dy: f64,
    },
    ResizeShape {
        id: ShapeId,
        width: f64,
        height: f64,
    },
    SetClipped {
        parent: ShapeId,
        child: ShapeId,
        clipped: bool,
    },
    SetInheritsTransform {
        parent: ShapeId,
        child: ShapeId,
        inherit: bool,
    },
    SetZIndex {
        id: ShapeId,
        z_index: i32,
    },
    SetVisible {
        id: ShapeId,
        visible: bool,
    },
    SetText {
        id: ShapeId,
        content: String,
    },
}

impl SceneMutation {
    /// The shape the mutation is about.
    pub fn target(&self) -> ShapeId {
        match self {
            SceneMutation::AddChild { child, .. }
            | SceneMutation::RemoveChild { child, .. }
            | SceneMutation::SetClipped { child, .. }
            | SceneMutation::SetInheritsTransform { child, .. } => *child,
            SceneMutation::MoveShape { id, .. }
            | SceneMutation::ResizeShape { id, .. }
            | SceneMutation::SetZIndex { id, .. }
            | SceneMutation::SetVisible { id, .. }
            | SceneMutation::SetText { id, .. } => *id,
        }
    }
}

/// Apply `mutation` to `scene`. Returns `false` when it referred to an
/// unknown shape or was refused by a model; nothing changed in that case.
pub fn apply_mutation(scene: &mut Scene, mutation: &SceneMutation) -> bool {
    match mutation {
        SceneMutation::AddChild {
            parent,
            child,
            edge,
        } => {
            let (Some(p), Some(c)) = (scene.index_of(*parent), scene.index_of(*child)) else {
                return false;
            };
            if !scene.add_child(p, c) {
                return false;
            }
            if let Some(edge) = edge {
                scene.set_clipped(p, c, edge.clipped);
                scene.set_inherits_transform(p, c, edge.inherits_transform);
            }
            true
        }
        SceneMutation::RemoveChild { parent, child } => {
            let (Some(p), Some(c)) = (scene.index_of(*parent), scene.index_of(*child)) else {
                return false;
            };
            // Membership is checked here; the scene treats a stale remove as a bug.
            if scene.parent(c) != Some(p) {
                log::debug!("REMOVE_CHILD skipped: {child} is not under {parent}");
                return false;
            }
            scene.remove_child(p, c);
            true
        }
        SceneMutation::MoveShape { id, dx, dy } => {
            let Some(idx) = scene.index_of(*id) else {
                return false;
            };
            scene.move_by(idx, Vec2::new(*dx, *dy));
            true
        }
        SceneMutation::ResizeShape { id, width, height } => {
            let Some(idx) = scene.index_of(*id) else {
                return false;
            };
            scene.set_size(idx, Size::new(*width, *height));
            true
        }
        SceneMutation::SetClipped {
            parent,
            child,
            clipped,
        } => match edge(scene, *parent, *child) {
            Some((p, c)) => {
                scene.set_clipped(p, c, *clipped);
                true
            }
            None => false,
        },
        SceneMutation::SetInheritsTransform {
            parent,
            child,
            inherit,
        } => match edge(scene, *parent, *child) {
            Some((p, c)) => {
                scene.set_inherits_transform(p, c, *inherit);
                true
            }
            None => false,
        },
        SceneMutation::SetZIndex { id, z_index } => {
            let Some(idx) = scene.index_of(*id) else {
                return false;
            };
            scene.set_z_index(idx, *z_index);
            true
        }
        SceneMutation::SetVisible { id, visible } => {
            let Some(idx) = scene.index_of(*id) else {
                return false;
            };
            scene.set_visible(idx, *visible);
            true
        }
        SceneMutation::SetText { id, content } => {
            let Some(idx) = scene.index_of(*id) else {
                return false;
            };
            scene.set_text(idx, content)
        }
    }
}

/// Resolve a parent–child pair that is currently an edge.
fn edge(
    scene: &Scene,
    parent: ShapeId,
    child: ShapeId,
) -> Option<(sc_core::ShapeIndex, sc_core::ShapeIndex)> {
    let p = scene.index_of(parent)?;
    let c = scene.index_of(child)?;
    (scene.parent(c) == Some(p)).then_some((p, c))
}

/// Current text of a text shape, for capturing inverses.
pub(crate) fn text_of(scene: &Scene, id: ShapeId) -> Option<String> {
    scene.get_by_id(id).and_then(|n| match &n.kind {
        ShapeKind::Text { content } => Some(content.clone()),
        _ => None,
    })
}
