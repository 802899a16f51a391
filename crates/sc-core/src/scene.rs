//! The shape arena and the container operations that mutate it.
//!
//! Shapes live in a `StableDiGraph`; the single incoming edge of a node is its
//! parent link. Which children a container has, in which order and with which
//! edge attributes, is the business of the container's model. `add_child` and
//! `remove_child` are the only places that touch parent links, so the link
//! and the model's membership always agree.
//!
//! Change propagation is plain recursion: a setter mutates one shape and calls
//! `shape_changed`, which tells the shape itself, its own model (for geometric
//! kinds) and its parent's model. Models decide whether to bubble further up.

use crate::ShapeIndex;
use crate::id::ShapeId;
use crate::model::{
    CaptionModel, ContainerModel, DiagramModel, EdgeAttributes, GenericModel, GroupModel,
};
use crate::shape::{ChangeKind, ResizeBehavior, ShapeKind, ShapeNode};
use kurbo::{Affine, Point, Rect, Size, Vec2};
use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use std::collections::HashMap;
use std::rc::Rc;

/// The default model installed for a container kind.
fn default_model(kind: &ShapeKind) -> Option<Rc<dyn ContainerModel>> {
    match kind {
        ShapeKind::Group => Some(Rc::new(GroupModel::new())),
        ShapeKind::Layer => Some(Rc::new(GenericModel::new())),
        ShapeKind::Caption { .. } => Some(Rc::new(CaptionModel::new())),
        ShapeKind::Diagram => Some(Rc::new(DiagramModel::default())),
        _ => None,
    }
}

/// All shapes, their parent links, and the models that own them.
#[derive(Debug, Default)]
pub struct Scene {
    graph: StableDiGraph<ShapeNode, ()>,
    id_index: HashMap<ShapeId, ShapeIndex>,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Arena ───────────────────────────────────────────────────────────

    /// Insert a standalone shape. Container kinds get their default model.
    pub fn insert(&mut self, mut node: ShapeNode) -> ShapeIndex {
        if node.model.is_none() {
            node.model = default_model(&node.kind);
        }
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.id_index.insert(id, idx);
        idx
    }

    /// Insert a standalone container driven by `model`.
    pub fn insert_with_model(
        &mut self,
        mut node: ShapeNode,
        model: Rc<dyn ContainerModel>,
    ) -> ShapeIndex {
        node.model = Some(model);
        self.insert(node)
    }

    pub fn contains(&self, shape: ShapeIndex) -> bool {
        self.graph.contains_node(shape)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, shape: ShapeIndex) -> Option<&ShapeNode> {
        self.graph.node_weight(shape)
    }

    /// Look up a shape by its id.
    pub fn get_by_id(&self, id: ShapeId) -> Option<&ShapeNode> {
        self.index_of(id).and_then(|idx| self.node(idx))
    }

    pub fn index_of(&self, id: ShapeId) -> Option<ShapeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn id_of(&self, shape: ShapeIndex) -> Option<ShapeId> {
        self.node(shape).map(|n| n.id)
    }

    /// Short label for log lines.
    pub fn describe(&self, shape: ShapeIndex) -> String {
        match self.node(shape) {
            Some(n) => n.id.to_string(),
            None => format!("<stale {}>", shape.index()),
        }
    }

    /// Shapes without a parent, in arena order.
    pub fn roots(&self) -> Vec<ShapeIndex> {
        self.graph
            .node_indices()
            .filter(|&idx| self.parent(idx).is_none())
            .collect()
    }

    // ─── Parent links ────────────────────────────────────────────────────

    pub fn parent(&self, shape: ShapeIndex) -> Option<ShapeIndex> {
        self.graph
            .neighbors_directed(shape, Direction::Incoming)
            .next()
    }

    /// The only writer of parent links.
    fn set_parent(&mut self, child: ShapeIndex, parent: Option<ShapeIndex>) {
        if let Some(old_parent) = self.parent(child)
            && let Some(edge) = self.graph.find_edge(old_parent, child)
        {
            self.graph.remove_edge(edge);
        }
        if let Some(parent) = parent {
            self.graph.add_edge(parent, child, ());
        }
    }

    /// Parent, grandparent, … up to the top of the tree.
    pub fn ancestors(&self, shape: ShapeIndex) -> Vec<ShapeIndex> {
        let mut out = Vec::new();
        let mut current = self.parent(shape);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Check if `ancestor` is a parent/grandparent/etc. of `descendant`.
    pub fn is_ancestor_of(&self, ancestor: ShapeIndex, descendant: ShapeIndex) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = self.parent(descendant);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// `shape` followed by all its descendants, depth-first in model order.
    pub fn subtree(&self, shape: ShapeIndex) -> Vec<ShapeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![shape];
        while let Some(s) = stack.pop() {
            out.push(s);
            if let Some(model) = self.model_of(s) {
                stack.extend(model.shapes().into_iter().rev());
            }
        }
        out
    }

    // ─── Containers ──────────────────────────────────────────────────────

    pub fn model_of(&self, shape: ShapeIndex) -> Option<Rc<dyn ContainerModel>> {
        self.node(shape).and_then(|n| n.model.clone())
    }

    pub fn is_container(&self, shape: ShapeIndex) -> bool {
        self.node(shape).is_some_and(ShapeNode::is_container)
    }

    /// Children of `container` in rendering order.
    pub fn shapes(&self, container: ShapeIndex) -> Vec<ShapeIndex> {
        self.model_of(container)
            .map(|m| m.shapes())
            .unwrap_or_default()
    }

    pub fn count(&self, container: ShapeIndex) -> usize {
        self.model_of(container).map_or(0, |m| m.count())
    }

    /// Attach `shape` to `container`, detaching it from any previous parent.
    ///
    /// Returns `true` if `shape` is a child of `container` afterwards.
    /// Attaching an existing child is a no-op. A shape the model refuses
    /// keeps its previous parent. Attaching a container below itself is
    /// refused.
    pub fn add_child(&mut self, container: ShapeIndex, shape: ShapeIndex) -> bool {
        if !self.contains(container) || !self.contains(shape) {
            log::warn!("ADD_CHILD with a stale shape handle");
            return false;
        }
        if self.parent(shape) == Some(container) {
            return true;
        }
        if container == shape || self.is_ancestor_of(shape, container) {
            log::warn!(
                "ADD_CHILD refused: {} would become its own descendant",
                self.describe(shape)
            );
            return false;
        }

        let model = match self.model_of(container) {
            Some(model) => model,
            None => {
                let model: Rc<dyn ContainerModel> = Rc::new(GenericModel::new());
                self.graph[container].model = Some(model.clone());
                model
            }
        };
        if !model.accepts(self, shape) {
            log::debug!(
                "ADD_CHILD {} rejected by model of {}",
                self.describe(shape),
                self.describe(container)
            );
            return false;
        }

        if let Some(old_parent) = self.parent(shape) {
            self.remove_child(old_parent, shape);
        }
        if let Some(displaced) = model.displaced_by(shape) {
            self.remove_child(container, displaced);
        }

        model.add(self, shape);
        if !model.contains(shape) {
            return false;
        }
        self.set_parent(shape, Some(container));
        self.graph[shape].notify_changed(ChangeKind::ParentChanged);
        log::trace!(
            "ADD_CHILD {} -> {}",
            self.describe(shape),
            self.describe(container)
        );

        model.shape_added_to_hierarchy(self, shape, container);
        self.notify_child_changed(container);
        true
    }

    /// Detach `shape` from `container`.
    ///
    /// `shape` must be a child of `container`; anything else is a caller bug
    /// (asserted in debug builds, ignored in release).
    pub fn remove_child(&mut self, container: ShapeIndex, shape: ShapeIndex) {
        let is_member = self.parent(shape) == Some(container);
        debug_assert!(
            is_member,
            "remove_child: {} is not a child of {}",
            self.describe(shape),
            self.describe(container)
        );
        if !is_member {
            log::warn!(
                "REMOVE_CHILD ignored: {} is not a child of {}",
                self.describe(shape),
                self.describe(container)
            );
            return;
        }
        let Some(model) = self.model_of(container) else {
            return;
        };

        model.shape_to_be_removed_from_hierarchy(self, shape, container);
        model.remove(shape);
        self.set_parent(shape, None);
        self.graph[shape].notify_changed(ChangeKind::ParentChanged);
        log::trace!(
            "REMOVE_CHILD {} <- {}",
            self.describe(shape),
            self.describe(container)
        );

        self.notify_child_changed(container);
    }

    /// Tell the parent model of `container` that something inside it changed.
    fn notify_child_changed(&mut self, container: ShapeIndex) {
        if let Some(parent) = self.parent(container)
            && let Some(model) = self.model_of(parent)
        {
            model.child_changed(self, container, ChangeKind::ChildChanged);
        }
    }

    /// Destroy `shape`. Its children are deleted or orphaned, each exactly
    /// once, according to its model.
    pub fn delete_shape(&mut self, shape: ShapeIndex) -> Option<ShapeNode> {
        if !self.contains(shape) {
            return None;
        }
        if let Some(parent) = self.parent(shape) {
            self.remove_child(parent, shape);
        }
        if let Some(model) = self.model_of(shape) {
            let delete_children = model.deletes_owned_shapes();
            for child in model.shapes() {
                if self.parent(child) == Some(shape) {
                    self.remove_child(shape, child);
                }
                if delete_children {
                    self.delete_shape(child);
                }
            }
        }
        let removed = self.graph.remove_node(shape);
        if let Some(node) = &removed {
            self.id_index.remove(&node.id);
            log::trace!("DELETE {}", node.id);
        }
        removed
    }

    // ─── Edge attributes & interaction policy ────────────────────────────

    pub fn set_clipped(&mut self, container: ShapeIndex, child: ShapeIndex, clipped: bool) {
        let Some(model) = self.model_of(container) else {
            return;
        };
        if !model.contains(child) || model.is_clipped(child) == clipped {
            return;
        }
        model.set_clipped(child, clipped);
        self.shape_changed(child, ChangeKind::ClipPathChanged);
    }

    pub fn is_clipped(&self, container: ShapeIndex, child: ShapeIndex) -> bool {
        self.model_of(container)
            .is_some_and(|m| m.is_clipped(child))
    }

    pub fn set_inherits_transform(
        &mut self,
        container: ShapeIndex,
        child: ShapeIndex,
        inherit: bool,
    ) {
        let Some(model) = self.model_of(container) else {
            return;
        };
        if !model.contains(child) || model.inherits_transform(child) == inherit {
            return;
        }
        model.set_inherits_transform(child, inherit);
        if model.inherits_transform(child) == inherit {
            self.shape_changed(child, ChangeKind::GenericMatrixChanged);
        }
    }

    pub fn inherits_transform(&self, container: ShapeIndex, child: ShapeIndex) -> bool {
        self.model_of(container)
            .is_some_and(|m| m.inherits_transform(child))
    }

    /// Edge attributes of `child` under its current parent.
    pub fn edge_attributes(&self, child: ShapeIndex) -> Option<EdgeAttributes> {
        let parent = self.parent(child)?;
        self.model_of(parent)?.edge_attributes(child)
    }

    /// True if interactive tools must not move `shape`.
    pub fn is_child_locked(&self, shape: ShapeIndex) -> bool {
        match self.parent(shape).and_then(|p| self.model_of(p)) {
            Some(model) => model.is_child_locked(self, shape),
            None => self.node(shape).is_some_and(|n| n.geometry_protected),
        }
    }

    /// Let the parent model veto or clamp an interactive move.
    pub fn propose_move(&self, shape: ShapeIndex, delta: Vec2) -> Vec2 {
        match self.parent(shape).and_then(|p| self.model_of(p)) {
            Some(model) => model.propose_move(self, shape, delta),
            None if self.node(shape).is_some_and(|n| !n.editable) => {
                log::debug!("MOVE refused: {} is not editable", self.describe(shape));
                Vec2::ZERO
            }
            None => delta,
        }
    }

    // ─── Change propagation ──────────────────────────────────────────────

    /// `kind` changed on `shape`: tell the shape, its own model (geometric
    /// kinds only, followed by every child), and its parent's model.
    pub fn shape_changed(&mut self, shape: ShapeIndex, kind: ChangeKind) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        node.notify_changed(kind);

        if kind.is_geometric()
            && let Some(model) = self.model_of(shape)
        {
            model.container_changed(self, shape, kind);
            for child in model.shapes() {
                if let Some(child_node) = self.graph.node_weight_mut(child) {
                    child_node.notify_changed(kind);
                }
            }
        }

        if let Some(parent) = self.parent(shape)
            && let Some(model) = self.model_of(parent)
        {
            model.child_changed(self, shape, kind);
        }
    }

    /// Run the paint-path hook of a container (diagram relayout).
    pub fn prepare_paint(&mut self, container: ShapeIndex) {
        if let Some(model) = self.model_of(container) {
            model.prepare_paint(self, container);
        }
    }

    // ─── Geometry reads ──────────────────────────────────────────────────

    pub fn position(&self, shape: ShapeIndex) -> Point {
        self.node(shape).map_or(Point::ZERO, |n| n.geometry.position)
    }

    pub fn size(&self, shape: ShapeIndex) -> Size {
        self.node(shape).map_or(Size::ZERO, |n| n.geometry.size)
    }

    pub fn local_transform(&self, shape: ShapeIndex) -> Affine {
        self.node(shape)
            .map_or(Affine::IDENTITY, |n| n.geometry.local_transform())
    }

    /// Local transform composed with every ancestor the edge inherits from.
    pub fn absolute_transform(&self, shape: ShapeIndex) -> Affine {
        let local = self.local_transform(shape);
        match self.parent(shape) {
            Some(parent) if self.inherits_transform(parent, shape) => {
                self.absolute_transform(parent) * local
            }
            _ => local,
        }
    }

    /// Extent in the shape's own coordinates: the model's derived bounds for
    /// containers that compute one, the outline rectangle otherwise.
    pub fn local_bounds(&self, shape: ShapeIndex) -> Rect {
        let outline = self
            .node(shape)
            .map_or(Rect::ZERO, |n| n.geometry.outline_rect());
        self.model_of(shape)
            .and_then(|m| m.content_bounds(self, shape))
            .unwrap_or(outline)
    }

    /// Bounding box in the parent's coordinates.
    pub fn bounds_in_parent(&self, shape: ShapeIndex) -> Rect {
        self.local_transform(shape)
            .transform_rect_bbox(self.local_bounds(shape))
    }

    /// Bounding box in scene coordinates.
    pub fn bounding_box(&self, shape: ShapeIndex) -> Rect {
        self.absolute_transform(shape)
            .transform_rect_bbox(self.local_bounds(shape))
    }

    /// Outline rectangle in scene coordinates, ignoring derived bounds.
    pub fn outline_bbox(&self, shape: ShapeIndex) -> Rect {
        let outline = self
            .node(shape)
            .map_or(Rect::ZERO, |n| n.geometry.outline_rect());
        self.absolute_transform(shape).transform_rect_bbox(outline)
    }

    // ─── Geometry writes ─────────────────────────────────────────────────

    pub fn set_position(&mut self, shape: ShapeIndex, position: Point) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        if node.geometry.position == position {
            return;
        }
        node.geometry.position = position;
        self.shape_changed(shape, ChangeKind::PositionChanged);
    }

    pub fn move_by(&mut self, shape: ShapeIndex, delta: Vec2) {
        let position = self.position(shape) + delta;
        self.set_position(shape, position);
    }

    pub fn set_size(&mut self, shape: ShapeIndex, size: Size) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        if node.geometry.size == size {
            return;
        }
        node.geometry.size = size;
        self.shape_changed(shape, ChangeKind::SizeChanged);
    }

    pub fn set_transform(&mut self, shape: ShapeIndex, transform: Affine) {
        self.update_transform(shape, ChangeKind::GenericMatrixChanged, |_| transform);
    }

    /// Rotate about the shape's centre.
    pub fn rotate(&mut self, shape: ShapeIndex, radians: f64) {
        let size = self.size(shape);
        let center = Point::new(size.width / 2.0, size.height / 2.0);
        self.update_transform(shape, ChangeKind::RotationChanged, |t| {
            t * Affine::rotate_about(radians, center)
        });
    }

    pub fn scale(&mut self, shape: ShapeIndex, sx: f64, sy: f64) {
        self.update_transform(shape, ChangeKind::ScaleChanged, |t| {
            t * Affine::scale_non_uniform(sx, sy)
        });
    }

    pub fn shear(&mut self, shape: ShapeIndex, shx: f64, shy: f64) {
        self.update_transform(shape, ChangeKind::ShearChanged, |t| {
            t * Affine::skew(shx, shy)
        });
    }

    fn update_transform(
        &mut self,
        shape: ShapeIndex,
        kind: ChangeKind,
        f: impl FnOnce(Affine) -> Affine,
    ) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        let next = f(node.geometry.transform);
        if next == node.geometry.transform {
            return;
        }
        node.geometry.transform = next;
        self.shape_changed(shape, kind);
    }

    pub fn set_z_index(&mut self, shape: ShapeIndex, z_index: i32) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        if node.geometry.z_index == z_index {
            return;
        }
        node.geometry.z_index = z_index;
        self.shape_changed(shape, ChangeKind::ZIndexChanged);
    }

    pub fn set_visible(&mut self, shape: ShapeIndex, visible: bool) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        if node.geometry.visible == visible {
            return;
        }
        node.geometry.visible = visible;
        self.shape_changed(shape, ChangeKind::VisibilityChanged);
    }

    /// Replace the content of a text shape. Returns `false` for other kinds.
    pub fn set_text(&mut self, shape: ShapeIndex, text: &str) -> bool {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return false;
        };
        let ShapeKind::Text { content } = &mut node.kind else {
            return false;
        };
        if content.as_str() != text {
            *content = text.to_string();
            self.shape_changed(shape, ChangeKind::ContentChanged);
        }
        true
    }

    /// Route a connector between two points in its parent's coordinates.
    pub fn set_connector_path(&mut self, shape: ShapeIndex, start: Point, end: Point) {
        let Some(node) = self.graph.node_weight_mut(shape) else {
            return;
        };
        let ShapeKind::Connector { start: s, end: e } = &mut node.kind else {
            return;
        };
        if *s == start && *e == end {
            return;
        }
        *s = start;
        *e = end;
        let bbox = Rect::from_points(start, end);
        node.geometry.position = bbox.origin();
        node.geometry.size = bbox.size();
        self.shape_changed(shape, ChangeKind::ParameterChanged);
    }

    pub fn set_geometry_protected(&mut self, shape: ShapeIndex, protected: bool) {
        if let Some(node) = self.graph.node_weight_mut(shape)
            && node.geometry_protected != protected
        {
            node.geometry_protected = protected;
            node.notify_changed(ChangeKind::ProtectionChanged);
        }
    }

    pub fn set_editable(&mut self, shape: ShapeIndex, editable: bool) {
        if let Some(node) = self.graph.node_weight_mut(shape)
            && node.editable != editable
        {
            node.editable = editable;
            node.notify_changed(ChangeKind::ProtectionChanged);
        }
    }

    // ─── Caption containers ──────────────────────────────────────────────

    pub fn set_resize_behavior(&mut self, caption: ShapeIndex, behavior: ResizeBehavior) {
        let Some(node) = self.graph.node_weight_mut(caption) else {
            return;
        };
        if let ShapeKind::Caption { resize, .. } = &mut node.kind
            && *resize != behavior
        {
            *resize = behavior;
            self.caption_content_changed(caption);
        }
    }

    pub fn set_preferred_text_rect(&mut self, caption: ShapeIndex, rect: Option<Rect>) {
        let Some(node) = self.graph.node_weight_mut(caption) else {
            return;
        };
        if let ShapeKind::Caption {
            preferred_text_rect,
            ..
        } = &mut node.kind
            && *preferred_text_rect != rect
        {
            *preferred_text_rect = rect;
            self.caption_content_changed(caption);
        }
    }

    /// Caption parameters are not geometry, so they bypass the geometric
    /// filter of `shape_changed` and go straight to the model.
    fn caption_content_changed(&mut self, caption: ShapeIndex) {
        if let Some(node) = self.graph.node_weight_mut(caption) {
            node.notify_changed(ChangeKind::ParameterChanged);
        }
        if let Some(model) = self.model_of(caption) {
            model.container_changed(self, caption, ChangeKind::ContentChanged);
        }
    }

    // ─── Diagram containers ──────────────────────────────────────────────

    /// Create a connector from the diagram's root to `child` and return it.
    pub fn connect_to_root(
        &mut self,
        diagram: ShapeIndex,
        child: ShapeIndex,
    ) -> Option<ShapeIndex> {
        let model = self.model_of(diagram)?;
        let diagram_model = model.as_any().downcast_ref::<DiagramModel>()?;
        if !diagram_model.children().contains(&child) {
            return None;
        }
        if let Some(existing) = diagram_model.connector_for(child) {
            return Some(existing);
        }
        let connector = self.insert(ShapeNode::anonymous(ShapeKind::Connector {
            start: Point::ZERO,
            end: Point::ZERO,
        }));
        self.add_child(diagram, connector);
        diagram_model.pair_connector(connector, child);
        Some(connector)
    }

    /// Run a scheduled diagram relayout. Returns whether a pass ran.
    pub fn layout(&mut self, diagram: ShapeIndex) -> bool {
        let Some(model) = self.model_of(diagram) else {
            return false;
        };
        match model.as_any().downcast_ref::<DiagramModel>() {
            Some(diagram_model) => diagram_model.layout(self, diagram),
            None => false,
        }
    }
}
