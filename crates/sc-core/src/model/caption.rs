use super::{ContainerModel, bubble_child_changed};
use crate::ShapeIndex;
use crate::scene::Scene;
use crate::shape::{ChangeKind, ResizeBehavior, ShapeKind};
use kurbo::{Point, Rect, Size};
use std::any::Any;
use std::cell::{Cell, RefCell};

#[derive(Debug, Clone, Copy)]
struct Slot {
    shape: ShapeIndex,
    clipped: bool,
}

/// Single-slot model for a shape with a text caption.
///
/// Admits exactly one child, and only one with text content; a second text
/// shape displaces the first. The caption always inherits the container's
/// transform. Size coupling between container and caption follows the
/// container's `ResizeBehavior`; `lock` keeps the two directions of that
/// coupling from feeding each other.
#[derive(Debug, Default)]
pub struct CaptionModel {
    slot: RefCell<Option<Slot>>,
    lock: Cell<bool>,
}

fn caption_settings(
    scene: &Scene,
    container: ShapeIndex,
) -> Option<(ResizeBehavior, Option<Rect>)> {
    match scene.node(container).map(|n| &n.kind) {
        Some(ShapeKind::Caption {
            resize,
            preferred_text_rect,
        }) => Some((*resize, *preferred_text_rect)),
        _ => None,
    }
}

impl CaptionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// The caption shape, if the slot is filled.
    pub fn text_shape(&self) -> Option<ShapeIndex> {
        self.slot.borrow().map(|s| s.shape)
    }

    fn with_lock(&self, f: impl FnOnce()) {
        self.lock.set(true);
        f();
        self.lock.set(false);
    }

    /// Place the caption according to the container's resize behavior.
    fn sync_text_to_container(&self, scene: &mut Scene, container: ShapeIndex) {
        let Some(text) = self.text_shape() else {
            return;
        };
        let Some((behavior, preferred)) = caption_settings(scene, container) else {
            // Not a caption kind: plain follow-size.
            let size = scene.size(container);
            self.with_lock(|| scene.set_size(text, size));
            return;
        };
        match behavior {
            ResizeBehavior::TextFollowsPreferredTextRect => {
                if let Some(rect) = preferred {
                    self.with_lock(|| {
                        scene.set_position(text, rect.origin());
                        scene.set_size(text, rect.size());
                    });
                }
            }
            ResizeBehavior::IndependentSizes => {}
            ResizeBehavior::TextFollowsSize | ResizeBehavior::ShapeFollowsText => {
                let size = scene.size(container);
                self.with_lock(|| {
                    scene.set_position(text, Point::ZERO);
                    scene.set_size(text, size);
                });
            }
        }
    }
}

impl ContainerModel for CaptionModel {
    fn add(&self, scene: &Scene, shape: ShapeIndex) {
        if !self.accepts(scene, shape) {
            log::debug!("CAPTION rejected {}: no text content", scene.describe(shape));
            return;
        }
        let mut slot = self.slot.borrow_mut();
        match *slot {
            Some(current) if current.shape == shape => {}
            Some(current) => {
                log::debug!(
                    "CAPTION {} replaced by {}",
                    scene.describe(current.shape),
                    scene.describe(shape)
                );
                *slot = Some(Slot {
                    shape,
                    clipped: false,
                });
            }
            None => {
                *slot = Some(Slot {
                    shape,
                    clipped: false,
                });
            }
        }
    }

    fn remove(&self, shape: ShapeIndex) {
        let mut slot = self.slot.borrow_mut();
        let held = slot.map(|s| s.shape);
        debug_assert!(
            held.is_none() || held == Some(shape),
            "caption remove of a shape that is not the caption"
        );
        if held == Some(shape) {
            *slot = None;
        }
    }

    fn accepts(&self, scene: &Scene, shape: ShapeIndex) -> bool {
        scene.node(shape).is_some_and(|n| n.has_text_content())
    }

    fn displaced_by(&self, shape: ShapeIndex) -> Option<ShapeIndex> {
        self.text_shape().filter(|&held| held != shape)
    }

    fn set_clipped(&self, shape: ShapeIndex, clipped: bool) {
        if let Some(slot) = self.slot.borrow_mut().as_mut()
            && slot.shape == shape
        {
            slot.clipped = clipped;
        }
    }

    fn is_clipped(&self, shape: ShapeIndex) -> bool {
        self.slot
            .borrow()
            .is_some_and(|s| s.shape == shape && s.clipped)
    }

    fn set_inherits_transform(&self, _shape: ShapeIndex, _inherit: bool) {
        log::trace!("CAPTION inherits_transform is fixed; ignoring");
    }

    fn inherits_transform(&self, shape: ShapeIndex) -> bool {
        self.text_shape() == Some(shape)
    }

    fn count(&self) -> usize {
        usize::from(self.slot.borrow().is_some())
    }

    fn shapes(&self) -> Vec<ShapeIndex> {
        self.text_shape().into_iter().collect()
    }

    fn contains(&self, shape: ShapeIndex) -> bool {
        self.text_shape() == Some(shape)
    }

    fn container_changed(&self, scene: &mut Scene, container: ShapeIndex, kind: ChangeKind) {
        if self.lock.get() {
            return;
        }
        if matches!(kind, ChangeKind::SizeChanged | ChangeKind::ContentChanged) {
            self.sync_text_to_container(scene, container);
        }
    }

    fn child_changed(&self, scene: &mut Scene, child: ShapeIndex, kind: ChangeKind) {
        if kind == ChangeKind::SizeChanged
            && !self.lock.get()
            && let Some(container) = scene.parent(child)
            && let Some((ResizeBehavior::ShapeFollowsText, _)) = caption_settings(scene, container)
        {
            let text = scene.size(child);
            let current = scene.size(container);
            let grown = Size::new(current.width.max(text.width), current.height.max(text.height));
            if grown != current {
                self.with_lock(|| scene.set_size(container, grown));
            }
        }
        bubble_child_changed(scene, child);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeNode;
    use pretty_assertions::assert_eq;

    fn caption(scene: &mut Scene, resize: ResizeBehavior) -> ShapeIndex {
        scene.insert(
            ShapeNode::anonymous(ShapeKind::Caption {
                resize,
                preferred_text_rect: None,
            })
            .with_rect(Rect::new(0.0, 0.0, 100.0, 40.0)),
        )
    }

    fn text(scene: &mut Scene, content: &str) -> ShapeIndex {
        scene.insert(
            ShapeNode::anonymous(ShapeKind::Text {
                content: content.into(),
            })
            .with_rect(Rect::new(0.0, 0.0, 30.0, 12.0)),
        )
    }

    #[test]
    fn text_follows_container_size() {
        let mut scene = Scene::new();
        let cap = caption(&mut scene, ResizeBehavior::TextFollowsSize);
        let label = text(&mut scene, "label");
        assert!(scene.add_child(cap, label));

        scene.set_size(cap, Size::new(120.0, 50.0));
        assert_eq!(scene.size(label), Size::new(120.0, 50.0));
        assert_eq!(scene.position(label), Point::ZERO);
        // The write-back did not feed into the container again.
        assert_eq!(scene.size(cap), Size::new(120.0, 50.0));
    }

    #[test]
    fn shape_follows_text_grows_container() {
        let mut scene = Scene::new();
        let cap = caption(&mut scene, ResizeBehavior::ShapeFollowsText);
        let label = text(&mut scene, "a long label");
        scene.add_child(cap, label);

        scene.set_size(label, Size::new(160.0, 20.0));
        assert_eq!(scene.size(cap), Size::new(160.0, 40.0));
        assert_eq!(scene.size(label), Size::new(160.0, 20.0));
    }

    #[test]
    fn preferred_rect_drives_text() {
        let mut scene = Scene::new();
        let cap = caption(&mut scene, ResizeBehavior::TextFollowsPreferredTextRect);
        let label = text(&mut scene, "boxed");
        scene.add_child(cap, label);

        scene.set_preferred_text_rect(cap, Some(Rect::new(10.0, 5.0, 60.0, 25.0)));
        assert_eq!(scene.position(label), Point::new(10.0, 5.0));
        assert_eq!(scene.size(label), Size::new(50.0, 20.0));

        scene.set_size(cap, Size::new(300.0, 300.0));
        assert_eq!(scene.size(label), Size::new(50.0, 20.0));
    }

    #[test]
    fn independent_sizes_do_not_couple() {
        let mut scene = Scene::new();
        let cap = caption(&mut scene, ResizeBehavior::IndependentSizes);
        let label = text(&mut scene, "free");
        scene.add_child(cap, label);

        scene.set_size(cap, Size::new(10.0, 10.0));
        assert_eq!(scene.size(label), Size::new(30.0, 12.0));
        scene.set_size(label, Size::new(90.0, 90.0));
        assert_eq!(scene.size(cap), Size::new(10.0, 10.0));
    }

    #[test]
    fn inherits_transform_is_fixed() {
        let mut scene = Scene::new();
        let cap = caption(&mut scene, ResizeBehavior::TextFollowsSize);
        let label = text(&mut scene, "fixed");
        scene.add_child(cap, label);

        scene.set_inherits_transform(cap, label, false);
        assert!(scene.inherits_transform(cap, label));
    }
}
