//! Container models: the pluggable strategies that own a container's children.
//!
//! A `Scene` never decides how a container stores its children, how an edge
//! is clipped, or what a container caches. It asks the container's model.
//! Models are shared (`Rc`) and take `&self`; their state sits behind
//! `RefCell`/`Cell` because a model hook may mutate the scene, and that
//! mutation may notify the very same model again. Models that write back
//! into their children guard those hooks with an explicit in-progress flag.

mod caption;
mod diagram;
mod generic;
mod group;

pub use caption::CaptionModel;
pub use diagram::DiagramModel;
pub use generic::GenericModel;
pub use group::GroupModel;

use crate::ShapeIndex;
use crate::scene::Scene;
use crate::shape::ChangeKind;
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ─── Edge attributes ─────────────────────────────────────────────────────

/// The boolean relation attributes a model tracks per parent–child edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    /// The child's visible region is intersected with the parent's outline.
    pub clipped: bool,
    /// The child's effective transform is `parent * child`.
    pub inherits_transform: bool,
}

impl Default for EdgeAttributes {
    fn default() -> Self {
        Self {
            clipped: false,
            inherits_transform: true,
        }
    }
}

// ─── Shape manager ───────────────────────────────────────────────────────

/// The on-screen registry that paints and hit-tests shapes. Must be told
/// when shapes enter or leave the tree below the model that holds it.
///
/// Both calls must be idempotent.
pub trait ShapeManager: fmt::Debug {
    fn add_shape(&mut self, shape: ShapeIndex);
    fn remove_shape(&mut self, shape: ShapeIndex);
}

/// A shape manager shared between the model that feeds it and its owner.
pub type SharedShapeManager = Rc<RefCell<dyn ShapeManager>>;

// ─── The model contract ──────────────────────────────────────────────────

/// Storage and policy for a container's children.
///
/// Storage calls (`add`, `remove`, attribute setters) never touch parent
/// links; `Scene::add_child` / `Scene::remove_child` own those. Attribute
/// reads for a shape that is not a member return `false`.
pub trait ContainerModel: fmt::Debug {
    /// Insert `shape`. A second add of the same shape is a no-op.
    fn add(&self, scene: &Scene, shape: ShapeIndex);

    /// Drop `shape` from storage.
    fn remove(&self, shape: ShapeIndex);

    /// Admission policy, checked by `Scene::add_child` before the shape is
    /// detached from its previous parent.
    fn accepts(&self, _scene: &Scene, _shape: ShapeIndex) -> bool {
        true
    }

    /// A member that must be evicted before `shape` can be admitted.
    fn displaced_by(&self, _shape: ShapeIndex) -> Option<ShapeIndex> {
        None
    }

    fn set_clipped(&self, shape: ShapeIndex, clipped: bool);
    fn is_clipped(&self, shape: ShapeIndex) -> bool;

    fn set_inherits_transform(&self, shape: ShapeIndex, inherit: bool);
    fn inherits_transform(&self, shape: ShapeIndex) -> bool;

    fn count(&self) -> usize;

    /// Children in rendering order.
    fn shapes(&self) -> Vec<ShapeIndex>;

    fn contains(&self, shape: ShapeIndex) -> bool {
        self.shapes().contains(&shape)
    }

    /// Both edge attributes of a member, `None` for a non-member.
    fn edge_attributes(&self, shape: ShapeIndex) -> Option<EdgeAttributes> {
        self.contains(shape).then(|| EdgeAttributes {
            clipped: self.is_clipped(shape),
            inherits_transform: self.inherits_transform(shape),
        })
    }

    /// True if the child or its container is geometry-protected.
    fn is_child_locked(&self, scene: &Scene, child: ShapeIndex) -> bool {
        default_is_child_locked(scene, child)
    }

    /// Veto or clamp an interactive move before it is applied.
    fn propose_move(&self, _scene: &Scene, _child: ShapeIndex, delta: Vec2) -> Vec2 {
        delta
    }

    /// The container's own geometry changed.
    fn container_changed(&self, _scene: &mut Scene, _container: ShapeIndex, _kind: ChangeKind) {}

    /// A child's geometry or style changed. The default tells the
    /// grandparent's model that the container changed.
    fn child_changed(&self, scene: &mut Scene, child: ShapeIndex, _kind: ChangeKind) {
        bubble_child_changed(scene, child);
    }

    /// `shape` was attached somewhere below `subtree_root`, the container
    /// that owns this model.
    fn shape_added_to_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        forward_added_to_hierarchy(scene, shape, subtree_root);
    }

    /// `shape` is about to be detached from somewhere below `subtree_root`.
    fn shape_to_be_removed_from_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        forward_removed_from_hierarchy(scene, shape, subtree_root);
    }

    /// Whether deleting the container deletes its children, or just orphans them.
    fn deletes_owned_shapes(&self) -> bool {
        true
    }

    /// Derived bounds of the children in the container's own coordinates,
    /// for models that compute one.
    fn content_bounds(&self, _scene: &Scene, _container: ShapeIndex) -> Option<Rect> {
        None
    }

    /// Called from the paint path before the container is drawn.
    fn prepare_paint(&self, _scene: &mut Scene, _container: ShapeIndex) {}

    fn as_any(&self) -> &dyn Any;
}

// ─── Base behaviors (shared by the defaults and by overriding models) ────

pub(crate) fn default_is_child_locked(scene: &Scene, child: ShapeIndex) -> bool {
    let child_locked = scene.node(child).is_some_and(|n| n.geometry_protected);
    let parent_locked = scene
        .parent(child)
        .and_then(|p| scene.node(p))
        .is_some_and(|n| n.geometry_protected);
    child_locked || parent_locked
}

/// Report `ChildChanged` for the container of `child` to the next model up.
pub fn bubble_child_changed(scene: &mut Scene, child: ShapeIndex) {
    let Some(container) = scene.parent(child) else {
        return;
    };
    let Some(grandparent) = scene.parent(container) else {
        return;
    };
    if let Some(model) = scene.model_of(grandparent) {
        log::trace!(
            "BUBBLE {} -> {}",
            scene.describe(container),
            scene.describe(grandparent)
        );
        model.child_changed(scene, container, ChangeKind::ChildChanged);
    }
}

/// Forward a hierarchy-attach notification to the parent of `subtree_root`.
pub fn forward_added_to_hierarchy(scene: &mut Scene, shape: ShapeIndex, subtree_root: ShapeIndex) {
    if let Some(parent) = scene.parent(subtree_root)
        && let Some(model) = scene.model_of(parent)
    {
        model.shape_added_to_hierarchy(scene, shape, parent);
    }
}

/// Forward a hierarchy-detach notification to the parent of `subtree_root`.
pub fn forward_removed_from_hierarchy(
    scene: &mut Scene,
    shape: ShapeIndex,
    subtree_root: ShapeIndex,
) {
    if let Some(parent) = scene.parent(subtree_root)
        && let Some(model) = scene.model_of(parent)
    {
        model.shape_to_be_removed_from_hierarchy(scene, shape, parent);
    }
}
