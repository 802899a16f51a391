use super::{ContainerModel, bubble_child_changed};
use crate::ShapeIndex;
use crate::config::DiagramConfig;
use crate::scene::Scene;
use crate::shape::{ChangeKind, ShapeKind};
use kurbo::{Point, Size, Vec2};
use smallvec::SmallVec;
use std::any::Any;
use std::cell::{Cell, RefCell};

#[derive(Debug, Default)]
struct DiagramState {
    root: Option<ShapeIndex>,
    children: Vec<ShapeIndex>,
    /// Every connector member, paired or not.
    connectors: Vec<ShapeIndex>,
    /// `(child, connector)`.
    pairs: SmallVec<[(ShapeIndex, ShapeIndex); 4]>,
    /// Container width after the previous pass.
    previous_width: Option<f64>,
}

/// Auto-layout model: a root shape with a row of children beneath it, each
/// child tied to the root by a connector.
///
/// Child positions are a function of the structure. Structural edits only
/// schedule a relayout; `layout` performs it, at most once per schedule.
/// While a pass runs, the position and size notifications it causes are
/// ignored.
#[derive(Debug, Default)]
pub struct DiagramModel {
    state: RefCell<DiagramState>,
    config: DiagramConfig,
    relayout_scheduled: Cell<bool>,
    in_layout: Cell<bool>,
    passes: Cell<usize>,
}

impl DiagramModel {
    pub fn new(config: DiagramConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> DiagramConfig {
        self.config
    }

    pub fn root(&self) -> Option<ShapeIndex> {
        self.state.borrow().root
    }

    pub fn children(&self) -> Vec<ShapeIndex> {
        self.state.borrow().children.clone()
    }

    pub fn connectors(&self) -> Vec<ShapeIndex> {
        self.state.borrow().connectors.clone()
    }

    pub fn connector_for(&self, child: ShapeIndex) -> Option<ShapeIndex> {
        self.state
            .borrow()
            .pairs
            .iter()
            .find(|(c, _)| *c == child)
            .map(|&(_, connector)| connector)
    }

    pub fn is_relayout_scheduled(&self) -> bool {
        self.relayout_scheduled.get()
    }

    /// Completed layout passes.
    pub fn layout_passes(&self) -> usize {
        self.passes.get()
    }

    pub fn schedule_relayout(&self) {
        self.relayout_scheduled.set(true);
    }

    /// Make `shape` (already a non-connector member) the root; the previous
    /// root becomes the first child.
    pub fn set_root(&self, shape: ShapeIndex) -> bool {
        let mut state = self.state.borrow_mut();
        if state.root == Some(shape) {
            return true;
        }
        let Some(i) = state.children.iter().position(|&c| c == shape) else {
            return false;
        };
        state.children.remove(i);
        state.pairs.retain(|(c, _)| *c != shape);
        if let Some(old_root) = state.root.replace(shape) {
            state.children.insert(0, old_root);
        }
        drop(state);
        self.schedule_relayout();
        true
    }

    /// Tie `connector` to `child`. Both must already be members.
    pub fn pair_connector(&self, connector: ShapeIndex, child: ShapeIndex) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.connectors.contains(&connector) || !state.children.contains(&child) {
            return false;
        }
        state
            .pairs
            .retain(|(c, conn)| *c != child && *conn != connector);
        state.pairs.push((child, connector));
        drop(state);
        self.schedule_relayout();
        true
    }

    /// Recompute the root/children arrangement if one is scheduled.
    /// Returns whether a pass ran.
    pub fn layout(&self, scene: &mut Scene, container: ShapeIndex) -> bool {
        if !self.relayout_scheduled.get() || self.in_layout.get() {
            return false;
        }
        self.in_layout.set(true);

        let (root, children, pairs, previous_width) = {
            let state = self.state.borrow();
            (
                state.root,
                state.children.clone(),
                state.pairs.clone(),
                state.previous_width,
            )
        };
        let DiagramConfig {
            spacing,
            vertical_gap,
        } = self.config;

        let root_size = root.map_or(Size::ZERO, |r| scene.size(r));
        let sizes: Vec<Size> = children.iter().map(|&c| scene.size(c)).collect();
        let gaps = children.len().saturating_sub(1) as f64 * spacing;
        let row_width = sizes.iter().map(|s| s.width).sum::<f64>() + gaps;
        let width = row_width.max(root_size.width);
        let tallest = sizes.iter().fold(0.0f64, |h, s| h.max(s.height));
        let row_y = root_size.height + vertical_gap;
        let height = if children.is_empty() {
            root_size.height
        } else {
            row_y + tallest
        };

        if let Some(root) = root {
            scene.set_position(root, Point::new((width - root_size.width) / 2.0, 0.0));
        }
        let mut x = (width - row_width) / 2.0;
        for (&child, size) in children.iter().zip(&sizes) {
            scene.set_position(child, Point::new(x, row_y));
            x += size.width + spacing;
        }

        scene.set_size(container, Size::new(width, height));
        if let Some(previous) = previous_width {
            let shift = (previous - width) / 2.0;
            if shift != 0.0 {
                scene.move_by(container, Vec2::new(shift, 0.0));
            }
        }

        if let Some(root) = root {
            let root_pos = scene.position(root);
            let anchor = Point::new(root_pos.x + root_size.width / 2.0, root_size.height);
            for (child, connector) in pairs {
                let child_pos = scene.position(child);
                let end = Point::new(child_pos.x + scene.size(child).width / 2.0, child_pos.y);
                scene.set_connector_path(connector, anchor, end);
            }
        }

        self.state.borrow_mut().previous_width = Some(width);
        self.relayout_scheduled.set(false);
        self.in_layout.set(false);
        self.passes.set(self.passes.get() + 1);
        log::debug!(
            "DIAGRAM layout {} children={} size={}x{}",
            scene.describe(container),
            children.len(),
            width,
            height
        );
        true
    }

    fn is_laid_out(state: &DiagramState, shape: ShapeIndex) -> bool {
        state.root == Some(shape) || state.children.contains(&shape)
    }
}

impl ContainerModel for DiagramModel {
    fn add(&self, scene: &Scene, shape: ShapeIndex) {
        let mut state = self.state.borrow_mut();
        if Self::is_laid_out(&state, shape) || state.connectors.contains(&shape) {
            return;
        }
        let is_connector = scene
            .node(shape)
            .is_some_and(|n| matches!(n.kind, ShapeKind::Connector { .. }));
        if is_connector {
            state.connectors.push(shape);
        } else if state.root.is_none() {
            state.root = Some(shape);
        } else {
            state.children.push(shape);
        }
        drop(state);
        self.schedule_relayout();
    }

    fn remove(&self, shape: ShapeIndex) {
        let mut state = self.state.borrow_mut();
        if state.root == Some(shape) {
            state.root = None;
        }
        state.children.retain(|&c| c != shape);
        state.connectors.retain(|&c| c != shape);
        state
            .pairs
            .retain(|(child, connector)| *child != shape && *connector != shape);
        drop(state);
        self.schedule_relayout();
    }

    fn set_clipped(&self, _shape: ShapeIndex, _clipped: bool) {
        log::trace!("DIAGRAM clipping is fixed; ignoring");
    }

    fn is_clipped(&self, _shape: ShapeIndex) -> bool {
        false
    }

    fn set_inherits_transform(&self, _shape: ShapeIndex, _inherit: bool) {
        log::trace!("DIAGRAM inherits_transform is fixed; ignoring");
    }

    fn inherits_transform(&self, shape: ShapeIndex) -> bool {
        self.contains(shape)
    }

    fn count(&self) -> usize {
        let state = self.state.borrow();
        usize::from(state.root.is_some()) + state.children.len() + state.connectors.len()
    }

    fn shapes(&self) -> Vec<ShapeIndex> {
        let state = self.state.borrow();
        state
            .root
            .iter()
            .chain(&state.children)
            .chain(&state.connectors)
            .copied()
            .collect()
    }

    fn contains(&self, shape: ShapeIndex) -> bool {
        let state = self.state.borrow();
        Self::is_laid_out(&state, shape) || state.connectors.contains(&shape)
    }

    fn container_changed(&self, _scene: &mut Scene, _container: ShapeIndex, kind: ChangeKind) {
        if self.in_layout.get() {
            return;
        }
        if kind == ChangeKind::SizeChanged {
            self.schedule_relayout();
        }
    }

    fn child_changed(&self, scene: &mut Scene, child: ShapeIndex, kind: ChangeKind) {
        let geometric = matches!(kind, ChangeKind::PositionChanged | ChangeKind::SizeChanged);
        if geometric && self.in_layout.get() {
            return;
        }
        if geometric && Self::is_laid_out(&self.state.borrow(), child) {
            self.schedule_relayout();
        }
        bubble_child_changed(scene, child);
    }

    fn prepare_paint(&self, scene: &mut Scene, container: ShapeIndex) {
        self.layout(scene, container);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeNode;
    use kurbo::Rect;
    use pretty_assertions::assert_eq;

    fn boxed(scene: &mut Scene, w: f64, h: f64) -> ShapeIndex {
        scene.insert(ShapeNode::anonymous(ShapeKind::Rect).with_rect(Rect::new(0.0, 0.0, w, h)))
    }

    fn diagram_model(scene: &Scene, diagram: ShapeIndex) -> std::rc::Rc<dyn ContainerModel> {
        scene.model_of(diagram).unwrap()
    }

    #[test]
    fn first_shape_becomes_root() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 80.0, 30.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);

        let model = diagram_model(&scene, diagram);
        let model = model.as_any().downcast_ref::<DiagramModel>().unwrap();
        assert_eq!(model.root(), Some(root));
        assert_eq!(model.children(), vec![a]);
        assert!(model.is_relayout_scheduled());
    }

    #[test]
    fn row_beneath_root() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 50.0, 30.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        let b = boxed(&mut scene, 60.0, 25.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);
        scene.add_child(diagram, b);

        assert!(scene.layout(diagram));
        // Row: 40 + 20 + 60 = 120 wide; root centred above it.
        assert_eq!(scene.size(diagram), Size::new(120.0, 30.0 + 40.0 + 25.0));
        assert_eq!(scene.position(root), Point::new(35.0, 0.0));
        assert_eq!(scene.position(a), Point::new(0.0, 70.0));
        assert_eq!(scene.position(b), Point::new(60.0, 70.0));
    }

    #[test]
    fn root_wider_than_row_centres_children() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 200.0, 30.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);

        scene.layout(diagram);
        assert_eq!(scene.size(diagram).width, 200.0);
        assert_eq!(scene.position(a), Point::new(80.0, 70.0));
    }

    #[test]
    fn connectors_route_root_to_child() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 40.0, 20.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);
        let connector = scene.connect_to_root(diagram, a).unwrap();

        scene.layout(diagram);
        let node = scene.node(connector).unwrap();
        assert_eq!(
            node.kind,
            ShapeKind::Connector {
                start: Point::new(20.0, 20.0),
                end: Point::new(20.0, 60.0),
            }
        );
        // Asking again returns the same connector.
        assert_eq!(scene.connect_to_root(diagram, a), Some(connector));
        assert_eq!(scene.connect_to_root(diagram, root), None);
    }

    #[test]
    fn container_shifts_to_keep_root_anchored() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 40.0, 20.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);
        scene.layout(diagram);
        assert_eq!(scene.position(diagram), Point::ZERO);

        let b = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, b);
        scene.layout(diagram);
        // Width went 40 -> 100; the container moves left by half the growth.
        assert_eq!(scene.position(diagram), Point::new(-30.0, 0.0));
        let root_abs = scene.bounding_box(root);
        assert_eq!(root_abs.x0, 0.0);
    }

    #[test]
    fn set_root_demotes_previous_root() {
        let mut scene = Scene::new();
        let diagram = scene.insert(ShapeNode::anonymous(ShapeKind::Diagram));
        let root = boxed(&mut scene, 40.0, 20.0);
        let a = boxed(&mut scene, 40.0, 20.0);
        let b = boxed(&mut scene, 40.0, 20.0);
        scene.add_child(diagram, root);
        scene.add_child(diagram, a);
        scene.add_child(diagram, b);

        let model = diagram_model(&scene, diagram);
        let model = model.as_any().downcast_ref::<DiagramModel>().unwrap();
        assert!(model.set_root(b));
        assert_eq!(model.root(), Some(b));
        assert_eq!(model.children(), vec![root, a]);
        assert!(!model.set_root(scene.insert(ShapeNode::anonymous(ShapeKind::Rect))));
    }
}
