//! Hit testing: point → shape lookup.
//!
//! Reverse-walks the paint list (front-to-back) to find which shape is at a
//! given scene position. A shape only counts where its clip chain lets it
//! show.

use crate::paint::PaintItem;
use kurbo::{Point, Rect};
use sc_core::ShapeIndex;

/// Find the topmost shape at `point`.
/// Returns `None` if nothing is hit (background).
pub fn hit_test(items: &[PaintItem], point: Point) -> Option<ShapeIndex> {
    items
        .iter()
        .rev()
        .find(|item| item_contains(item, point))
        .map(|item| item.shape)
}

fn item_contains(item: &PaintItem, point: Point) -> bool {
    if !item.clip.iter().all(|clip| clip.contains(point)) {
        return false;
    }
    // Test in shape space so rotated shapes hit on their outline, not on
    // their axis-aligned bounds.
    let det = item.transform.determinant();
    if det.abs() < f64::EPSILON {
        return false;
    }
    let local = item.transform.inverse() * point;
    item.local.contains(local)
}

/// Find all shapes whose visible bounds intersect `rect`, in paint order.
/// Used for marquee (box) selection.
pub fn hit_test_rect(items: &[PaintItem], rect: Rect) -> Vec<ShapeIndex> {
    items
        .iter()
        .filter(|item| intersects(item.visible_bounds(), rect))
        .map(|item| item.shape)
        .collect()
}

fn intersects(a: Rect, b: Rect) -> bool {
    a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::paint_list;
    use crate::registry::ShapeRegistry;
    use pretty_assertions::assert_eq;
    use sc_core::{GenericModel, Scene, ShapeKind, ShapeNode};
    use std::rc::Rc;

    fn item(shape: ShapeIndex, rect: Rect) -> PaintItem {
        PaintItem {
            shape,
            transform: kurbo::Affine::translate(rect.origin().to_vec2()),
            local: Rect::from_origin_size(Point::ZERO, rect.size()),
            clip: Vec::new(),
            component: false,
        }
    }

    #[test]
    fn topmost_wins() {
        let a = ShapeIndex::new(0);
        let b = ShapeIndex::new(1);
        let items = vec![
            item(a, Rect::new(0.0, 0.0, 100.0, 100.0)),
            item(b, Rect::new(50.0, 50.0, 150.0, 150.0)),
        ];
        assert_eq!(hit_test(&items, Point::new(75.0, 75.0)), Some(b));
        assert_eq!(hit_test(&items, Point::new(25.0, 25.0)), Some(a));
        assert_eq!(hit_test(&items, Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn clip_hides_overflow() {
        let a = ShapeIndex::new(0);
        let mut clipped = item(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        clipped.clip.push(Rect::new(0.0, 0.0, 40.0, 40.0));
        let items = vec![clipped];
        assert_eq!(hit_test(&items, Point::new(20.0, 20.0)), Some(a));
        assert_eq!(hit_test(&items, Point::new(60.0, 60.0)), None);
        assert!(hit_test_rect(&items, Rect::new(50.0, 50.0, 90.0, 90.0)).is_empty());
    }

    #[test]
    fn marquee_collects_in_paint_order() {
        let a = ShapeIndex::new(0);
        let b = ShapeIndex::new(1);
        let c = ShapeIndex::new(2);
        let items = vec![
            item(a, Rect::new(0.0, 0.0, 10.0, 10.0)),
            item(b, Rect::new(20.0, 0.0, 30.0, 10.0)),
            item(c, Rect::new(200.0, 0.0, 210.0, 10.0)),
        ];
        assert_eq!(
            hit_test_rect(&items, Rect::new(5.0, 5.0, 25.0, 25.0)),
            vec![a, b]
        );
    }

    #[test]
    fn rotated_shape_hits_on_outline() {
        let registry = ShapeRegistry::shared();
        let mut scene = Scene::new();
        let root = scene.insert_with_model(
            ShapeNode::anonymous(ShapeKind::Layer),
            Rc::new(GenericModel::new().with_shape_manager(registry.clone())),
        );
        let bar = scene.insert(
            ShapeNode::anonymous(ShapeKind::Rect).with_rect(Rect::new(0.0, 0.0, 100.0, 10.0)),
        );
        scene.add_child(root, bar);
        scene.rotate(bar, std::f64::consts::FRAC_PI_4);

        let items = paint_list(&mut scene, &registry);
        // Centre is on the outline; a bbox corner is not.
        assert_eq!(hit_test(&items, Point::new(50.0, 5.0)), Some(bar));
        let corner = items[0].bounds().origin() + kurbo::Vec2::new(1.0, 1.0);
        assert_eq!(hit_test(&items, corner), None);
    }
}
