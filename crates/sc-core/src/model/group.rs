use super::{ContainerModel, GenericModel, bubble_child_changed};
use crate::ShapeIndex;
use crate::scene::Scene;
use crate::shape::ChangeKind;
use kurbo::{Affine, Rect, Vec2};
use std::any::Any;
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, Copy)]
struct CachedBounds {
    /// Union of the children in group space; `None` for an empty group.
    rect: Option<Rect>,
    /// The group's absolute transform at compute time, recorded only when
    /// some shape in the subtree does not inherit the transform.
    basis: Option<Affine>,
}

/// A generic model that also owns the group's bounding-box cache.
///
/// Bounds are kept in the group's own coordinates and recomputed lazily on
/// the first read after a structural or geometric change of a member.
#[derive(Debug, Default)]
pub struct GroupModel {
    inner: GenericModel,
    cache: RefCell<Option<CachedBounds>>,
    recomputes: Cell<usize>,
}

impl GroupModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inner(inner: GenericModel) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.cache.borrow().is_none()
    }

    /// How many times the bounds have been recomputed.
    pub fn recompute_count(&self) -> usize {
        self.recomputes.get()
    }

    fn invalidate(&self) {
        if self.cache.borrow_mut().take().is_some() {
            log::trace!("GROUP bounds invalidated");
        }
    }

    /// Recompute the children's union without touching the cache.
    pub fn bounds_uncached(&self, scene: &Scene, container: ShapeIndex) -> Option<Rect> {
        self.compute(scene, container).rect
    }

    fn compute(&self, scene: &Scene, container: ShapeIndex) -> CachedBounds {
        let mut rect: Option<Rect> = None;
        let mut basis: Option<Affine> = None;
        for child in self.inner.shapes() {
            let child_rect = if self.inner.inherits_transform(child) {
                // A detached shape further down still pins these bounds to
                // our absolute transform.
                if basis.is_none() && has_detached_descendant(scene, child) {
                    basis = Some(scene.absolute_transform(container));
                }
                scene.bounds_in_parent(child)
            } else {
                // Detached children live in scene space; bring them into ours.
                let group_abs = *basis.get_or_insert_with(|| scene.absolute_transform(container));
                group_abs.inverse().transform_rect_bbox(scene.bounding_box(child))
            };
            rect = Some(rect.map_or(child_rect, |r| r.union(child_rect)));
        }
        CachedBounds { rect, basis }
    }
}

/// True if some shape strictly below `shape` does not inherit its parent's
/// transform.
fn has_detached_descendant(scene: &Scene, shape: ShapeIndex) -> bool {
    scene
        .subtree(shape)
        .into_iter()
        .skip(1)
        .any(|s| scene.parent(s).is_some_and(|p| !scene.inherits_transform(p, s)))
}

impl ContainerModel for GroupModel {
    fn add(&self, scene: &Scene, shape: ShapeIndex) {
        self.inner.add(scene, shape);
        self.invalidate();
    }

    fn remove(&self, shape: ShapeIndex) {
        self.inner.remove(shape);
        self.invalidate();
    }

    fn set_clipped(&self, shape: ShapeIndex, clipped: bool) {
        self.inner.set_clipped(shape, clipped);
    }

    fn is_clipped(&self, shape: ShapeIndex) -> bool {
        self.inner.is_clipped(shape)
    }

    fn set_inherits_transform(&self, shape: ShapeIndex, inherit: bool) {
        self.inner.set_inherits_transform(shape, inherit);
        self.invalidate();
    }

    fn inherits_transform(&self, shape: ShapeIndex) -> bool {
        self.inner.inherits_transform(shape)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn shapes(&self) -> Vec<ShapeIndex> {
        self.inner.shapes()
    }

    fn contains(&self, shape: ShapeIndex) -> bool {
        self.inner.contains(shape)
    }

    fn propose_move(&self, scene: &Scene, child: ShapeIndex, delta: Vec2) -> Vec2 {
        self.inner.propose_move(scene, child, delta)
    }

    fn container_changed(&self, _scene: &mut Scene, _container: ShapeIndex, kind: ChangeKind) {
        if kind.is_geometric() {
            self.invalidate();
        }
    }

    fn child_changed(&self, scene: &mut Scene, child: ShapeIndex, kind: ChangeKind) {
        // ChildChanged: a nested group's own bounds moved.
        if kind.affects_outline() || kind == ChangeKind::ChildChanged {
            self.invalidate();
        }
        bubble_child_changed(scene, child);
    }

    fn shape_added_to_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        self.inner.shape_added_to_hierarchy(scene, shape, subtree_root);
    }

    fn shape_to_be_removed_from_hierarchy(
        &self,
        scene: &mut Scene,
        shape: ShapeIndex,
        subtree_root: ShapeIndex,
    ) {
        self.inner
            .shape_to_be_removed_from_hierarchy(scene, shape, subtree_root);
    }

    fn deletes_owned_shapes(&self) -> bool {
        self.inner.deletes_owned_shapes()
    }

    fn content_bounds(&self, scene: &Scene, container: ShapeIndex) -> Option<Rect> {
        if let Some(cached) = *self.cache.borrow() {
            let valid = cached
                .basis
                .is_none_or(|basis| basis == scene.absolute_transform(container));
            if valid {
                return cached.rect;
            }
        }
        let fresh = self.compute(scene, container);
        self.recomputes.set(self.recomputes.get() + 1);
        log::debug!(
            "GROUP bounds recomputed for {}: {:?}",
            scene.describe(container),
            fresh.rect
        );
        *self.cache.borrow_mut() = Some(fresh);
        fresh.rect
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
