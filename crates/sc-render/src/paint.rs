//! Scene → ordered paint list.
//!
//! Walks the registered shapes front-to-back in painting order and resolves
//! what a backend needs per shape: absolute transform, local extent, and the
//! clip chain contributed by clipped ancestor edges.

use crate::registry::ShapeRegistry;
use kurbo::{Affine, Rect};
use sc_core::{Scene, ShapeIndex};
use std::cell::RefCell;

/// One shape, ready to paint.
#[derive(Debug, Clone, PartialEq)]
pub struct PaintItem {
    pub shape: ShapeIndex,
    /// Shape space → scene space.
    pub transform: Affine,
    /// Extent in shape space.
    pub local: Rect,
    /// Scene-space outlines of every ancestor that clips this shape,
    /// outermost first.
    pub clip: Vec<Rect>,
    /// The shape is a container whose children follow it in the list.
    pub component: bool,
}

impl PaintItem {
    /// Axis-aligned bounds in scene space, before clipping.
    pub fn bounds(&self) -> Rect {
        self.transform.transform_rect_bbox(self.local)
    }

    /// Bounds intersected with the clip chain.
    pub fn visible_bounds(&self) -> Rect {
        self.clip
            .iter()
            .fold(self.bounds(), |acc, clip| acc.intersect(*clip))
    }
}

/// Build the paint list for everything in `registry`.
///
/// Containers get their `prepare_paint` hook first (diagrams relayout here),
/// so the list reflects settled geometry. Siblings are ordered by z-index,
/// ties keep the model's order; parents precede their children. Hidden
/// shapes are skipped together with their subtree.
pub fn paint_list(scene: &mut Scene, registry: &RefCell<ShapeRegistry>) -> Vec<PaintItem> {
    let containers: Vec<ShapeIndex> = registry
        .borrow()
        .shapes()
        .filter(|&s| scene.is_container(s))
        .collect();
    for container in containers {
        scene.prepare_paint(container);
    }

    let registry = registry.borrow();
    let mut items = Vec::new();
    let top_level = by_z_index(scene, registry.top_level(scene));
    for shape in top_level {
        let clip = inherited_clip(scene, shape);
        paint_node(scene, &registry, shape, &clip, &mut items);
    }
    log::trace!("PAINT {} items", items.len());
    items
}

fn paint_node(
    scene: &Scene,
    registry: &ShapeRegistry,
    shape: ShapeIndex,
    clip: &[Rect],
    items: &mut Vec<PaintItem>,
) {
    let Some(node) = scene.node(shape) else {
        return;
    };
    if !node.geometry.visible {
        return;
    }

    items.push(PaintItem {
        shape,
        transform: scene.absolute_transform(shape),
        local: scene.local_bounds(shape),
        clip: clip.to_vec(),
        component: node.is_container(),
    });

    let children: Vec<ShapeIndex> = scene
        .shapes(shape)
        .into_iter()
        .filter(|&c| registry.contains(c))
        .collect();
    if children.is_empty() {
        return;
    }
    let outline = scene.outline_bbox(shape);
    for child in by_z_index(scene, children) {
        if scene.is_clipped(shape, child) {
            let mut chain = clip.to_vec();
            chain.push(outline);
            paint_node(scene, registry, child, &chain, items);
        } else {
            paint_node(scene, registry, child, clip, items);
        }
    }
}

/// Clip chain a top-level shape picks up from unregistered ancestors.
fn inherited_clip(scene: &Scene, shape: ShapeIndex) -> Vec<Rect> {
    let mut chain = Vec::new();
    let mut child = shape;
    while let Some(parent) = scene.parent(child) {
        if scene.is_clipped(parent, child) {
            chain.push(scene.outline_bbox(parent));
        }
        child = parent;
    }
    chain.reverse();
    chain
}

fn by_z_index(scene: &Scene, mut shapes: Vec<ShapeIndex>) -> Vec<ShapeIndex> {
    shapes.sort_by_key(|&s| scene.node(s).map_or(0, |n| n.geometry.z_index));
    shapes
}
