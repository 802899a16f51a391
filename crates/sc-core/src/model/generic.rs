use super::{
    ContainerModel, SharedShapeManager, forward_added_to_hierarchy,
    forward_removed_from_hierarchy,
};
use crate::ShapeIndex;
use crate::scene::Scene;
use kurbo::Vec2;
use std::any::Any;
use std::cell::RefCell;

/// Children plus two parallel attribute vectors, kept index-aligned.
#[derive(Debug, Default)]
struct Members {
    shapes: Vec<ShapeIndex>,
    clipped: Vec<bool>,
    inherits: Vec<bool>,
}

impl Members {
    fn position(&self, shape: ShapeIndex) -> Option<usize> {
        self.shapes.iter().position(|&s| s == shape)
    }
}

/// Unrestricted list of children with independent clip / inherit flags.
///
/// New children default to `clipped = false`, `inherits_transform = true`.
/// When a shape manager is attached, every shape that enters or leaves the
/// tree below this model is registered with / removed from it, so a model at
/// the root of the on-screen tree keeps the manager's set equal to the
/// tree's contents.
#[derive(Debug)]
pub struct GenericModel {
    members: RefCell<Members>,
    manager: Option<SharedShapeManager>,
    delete_owned_shapes: bool,
}

impl Default for GenericModel {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericModel {
    pub fn new() -> Self {
        Self {
            members: RefCell::new(Members::default()),
            manager: None,
            delete_owned_shapes: true,
        }
    }

    /// Mirror every hierarchy change below this model into `manager`.
    pub fn with_shape_manager(mut self, manager: SharedShapeManager) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Deleting the container orphans its children instead of deleting them.
    pub fn detach_owned_shapes(mut self) -> Self {
        self.delete_owned_shapes = false;
        self
    }

    pub fn shape_manager(&self) -> Option<&SharedShapeManager> {
        self.manager.as_ref()
    }
}

impl ContainerModel for GenericModel {
    fn add(&self, _scene: &Scene, shape: ShapeIndex) {
        let mut members = self.members.borrow_mut();
        if members.position(shape).is_some() {
            return;
        }
        members.shapes.push(shape);
        members.clipped.push(false);
        members.inherits.push(true);
    }

    fn remove(&self, shape: ShapeIndex) {
        let mut members = self.members.borrow_mut();
        if let Some(i) = members.position(shape) {
            members.shapes.remove(i);
            members.clipped.remove(i);
            members.inherits.remove(i);
        }
    }

    fn set_clipped(&self, shape: ShapeIndex, clipped: bool) {
        let mut members = self.members.borrow_mut();
        if let Some(i) = members.position(shape) {
            members.clipped[i] = clipped;
        }
    }

    fn is_clipped(&self, shape: ShapeIndex) -> bool {
        let members = self.members.borrow();
        members.position(shape).is_some_and(|i| members.clipped[i])
    }

    fn set_inherits_transform(&self, shape: ShapeIndex, inherit: bool) {
        let mut members = self.members.borrow_mut();
        if let Some(i) = members.position(shape) {
            members.inherits[i] = inherit;
        }
    }

    fn inherits_transform(&self, shape: ShapeIndex) -> bool {
        let members = self.members.borrow();
        members.position(shape).is_some_and(|i| members.inherits[i])
    }

    fn count(&self) -> usize {
        self.members.borrow().shapes.len()
    }

    fn shapes(&self) -> Vec<ShapeIndex> {
        self.members.borrow().shapes.clone()
    }

    fn contains(&self, shape: ShapeIndex) -> bool {
        self.members.borrow().position(shape).is_some()
    }

    /// Zero the move if the child or any ancestor is not editable.
    fn propose_move(&self, scene: &Scene, child: ShapeIndex, delta: Vec2) -> Vec2 {
        let mut current = Some(child);
        while let Some(shape) = current {
            if scene.node(shape).is_some_and(|n| !n.editable) {
                log::debug!("MOVE refused: {} is not editable", scene.describe(shape));
                return Vec2::ZERO;
            }
            current = scene.parent(shape);
        }
        delta
    }

    fn shape_added_to_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        if let Some(manager) = &self.manager {
            let mut manager = manager.borrow_mut();
            for s in scene.subtree(shape) {
                manager.add_shape(s);
            }
        }
        forward_added_to_hierarchy(scene, shape, subtree_root);
    }

    fn shape_to_be_removed_from_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        if let Some(manager) = &self.manager {
            let mut manager = manager.borrow_mut();
            for s in scene.subtree(shape) {
                manager.remove_shape(s);
            }
        }
        forward_removed_from_hierarchy(scene, shape, subtree_root);
    }

    fn deletes_owned_shapes(&self) -> bool {
        self.delete_owned_shapes
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
