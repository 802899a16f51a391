//! The on-screen shape registry.
//!
//! Fed by a root `GenericModel` through the `ShapeManager` hooks, so its set
//! always equals the managed tree's contents. Also remembers the revision of
//! each shape it last handed out as dirty.

use sc_core::{Scene, ShapeIndex, ShapeManager};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct ShapeRegistry {
    shapes: BTreeSet<ShapeIndex>,
    /// Revision of each shape at the last `take_dirty`.
    seen: HashMap<ShapeIndex, u64>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry ready to hand to `GenericModel::with_shape_manager`.
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn contains(&self, shape: ShapeIndex) -> bool {
        self.shapes.contains(&shape)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shapes(&self) -> impl Iterator<Item = ShapeIndex> + '_ {
        self.shapes.iter().copied()
    }

    /// Registered shapes whose parent is not registered, grouped by parent
    /// in the parent's child order. Parentless shapes come last.
    pub fn top_level(&self, scene: &Scene) -> Vec<ShapeIndex> {
        let mut parents = BTreeSet::new();
        let mut orphans = Vec::new();
        for shape in self.shapes() {
            match scene.parent(shape) {
                Some(p) if self.contains(p) => {}
                Some(p) => {
                    parents.insert(p);
                }
                None => orphans.push(shape),
            }
        }
        let mut out: Vec<ShapeIndex> = parents
            .into_iter()
            .flat_map(|p| scene.shapes(p))
            .filter(|&s| self.contains(s))
            .collect();
        out.extend(orphans);
        out
    }

    /// Registered shapes whose revision advanced since the previous call,
    /// including shapes registered since then.
    pub fn take_dirty(&mut self, scene: &Scene) -> Vec<ShapeIndex> {
        let mut dirty = Vec::new();
        for &shape in &self.shapes {
            let Some(node) = scene.node(shape) else {
                continue;
            };
            let revision = node.revision();
            if self.seen.insert(shape, revision) != Some(revision) {
                dirty.push(shape);
            }
        }
        if !dirty.is_empty() {
            log::trace!("REGISTRY {} dirty shapes", dirty.len());
        }
        dirty
    }
}

impl ShapeManager for ShapeRegistry {
    fn add_shape(&mut self, shape: ShapeIndex) {
        if self.shapes.insert(shape) {
            log::trace!("REGISTRY add #{}", shape.index());
        }
    }

    fn remove_shape(&mut self, shape: ShapeIndex) {
        if self.shapes.remove(&shape) {
            self.seen.remove(&shape);
            log::trace!("REGISTRY remove #{}", shape.index());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;
    use pretty_assertions::assert_eq;
    use sc_core::{GenericModel, ShapeKind, ShapeNode};

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut scene = Scene::new();
        let a = scene.insert(ShapeNode::anonymous(ShapeKind::Rect));
        let mut registry = ShapeRegistry::new();
        registry.add_shape(a);
        registry.add_shape(a);
        assert_eq!(registry.len(), 1);
        registry.remove_shape(a);
        registry.remove_shape(a);
        assert!(registry.is_empty());
    }

    #[test]
    fn dirty_tracking_follows_revisions() {
        let registry = ShapeRegistry::shared();
        let mut scene = Scene::new();
        let root = scene.insert_with_model(
            ShapeNode::anonymous(ShapeKind::Layer),
            Rc::new(GenericModel::new().with_shape_manager(registry.clone())),
        );
        let a = scene.insert(ShapeNode::anonymous(ShapeKind::Rect));
        let b = scene.insert(ShapeNode::anonymous(ShapeKind::Ellipse));
        scene.add_child(root, a);
        scene.add_child(root, b);

        assert_eq!(registry.borrow_mut().take_dirty(&scene), vec![a, b]);
        assert!(registry.borrow_mut().take_dirty(&scene).is_empty());

        scene.set_position(b, Point::new(3.0, 4.0));
        assert_eq!(registry.borrow_mut().take_dirty(&scene), vec![b]);
    }

    #[test]
    fn top_level_follows_child_order() {
        let registry = ShapeRegistry::shared();
        let mut scene = Scene::new();
        let root = scene.insert_with_model(
            ShapeNode::anonymous(ShapeKind::Layer),
            Rc::new(GenericModel::new().with_shape_manager(registry.clone())),
        );
        let group = scene.insert(ShapeNode::anonymous(ShapeKind::Group));
        let a = scene.insert(ShapeNode::anonymous(ShapeKind::Rect));
        let b = scene.insert(ShapeNode::anonymous(ShapeKind::Rect));
        scene.add_child(root, b);
        scene.add_child(group, a);
        scene.add_child(root, group);

        assert_eq!(registry.borrow().top_level(&scene), vec![b, group]);
    }
}
