//! Integration tests: undo/redo command stack (sc-editor).
//!
//! Tests the CommandStack + Scene interaction across crate boundaries:
//! structural edits are inverted with their edge attributes, and a drag
//! gesture from the select tool undoes in one step.

use kurbo::{Point, Rect};
use pretty_assertions::assert_eq;
use sc_core::{
    EdgeAttributes, GenericModel, ResizeBehavior, Scene, ShapeId, ShapeIndex, ShapeKind, ShapeNode,
};
use sc_editor::{CommandStack, InputEvent, Modifiers, SceneMutation, SelectTool};
use sc_render::{ShapeRegistry, paint_list};
use std::rc::Rc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn id(name: &str) -> ShapeId {
    ShapeId::intern(name)
}

fn idx(scene: &Scene, name: &str) -> ShapeIndex {
    scene.index_of(id(name)).unwrap()
}

/// `left` and `right` layers; `box` under `left`.
fn make_scene() -> Scene {
    let mut scene = Scene::new();
    let left = scene.insert(ShapeNode::new(id("left"), ShapeKind::Layer));
    scene.insert(ShapeNode::new(id("right"), ShapeKind::Layer));
    let shape = scene.insert(
        ShapeNode::new(id("box"), ShapeKind::Rect).with_rect(Rect::new(0.0, 0.0, 100.0, 50.0)),
    );
    scene.add_child(left, shape);
    scene
}

// ─── Structural edits ───────────────────────────────────────────────────

#[test]
fn undo_add_child_restores_previous_parent() {
    init_logger();
    let mut scene = make_scene();
    let mut stack = CommandStack::new(100);
    let left = idx(&scene, "left");
    let shape = idx(&scene, "box");
    scene.set_clipped(left, shape, true);

    stack.execute(
        &mut scene,
        SceneMutation::AddChild {
            parent: id("right"),
            child: id("box"),
            edge: None,
        },
        "Move to right",
    );
    assert_eq!(scene.parent(shape), Some(idx(&scene, "right")));
    assert!(!scene.is_clipped(idx(&scene, "right"), shape));

    let desc = stack.undo(&mut scene);
    assert_eq!(desc.as_deref(), Some("Move to right"));
    assert_eq!(scene.parent(shape), Some(left));
    assert!(scene.is_clipped(left, shape));
    assert!(scene.shapes(idx(&scene, "right")).is_empty());

    stack.redo(&mut scene);
    assert_eq!(scene.parent(shape), Some(idx(&scene, "right")));
}

#[test]
fn undo_add_of_fresh_shape_detaches_it() {
    let mut scene = make_scene();
    let mut stack = CommandStack::new(100);
    let loose = scene.insert(ShapeNode::new(id("loose"), ShapeKind::Ellipse));

    stack.execute(
        &mut scene,
        SceneMutation::AddChild {
            parent: id("right"),
            child: id("loose"),
            edge: None,
        },
        "Attach",
    );
    stack.undo(&mut scene);
    assert_eq!(scene.parent(loose), None);
}

#[test]
fn undo_remove_child_restores_edge_attributes() {
    let mut scene = make_scene();
    let mut stack = CommandStack::new(100);
    let left = idx(&scene, "left");
    let shape = idx(&scene, "box");
    scene.set_inherits_transform(left, shape, false);

    stack.execute(
        &mut scene,
        SceneMutation::RemoveChild {
            parent: id("left"),
            child: id("box"),
        },
        "Detach box",
    );
    assert_eq!(scene.parent(shape), None);
    assert_eq!(scene.count(left), 0);

    stack.undo(&mut scene);
    assert_eq!(scene.parent(shape), Some(left));
    assert_eq!(
        scene.edge_attributes(shape),
        Some(EdgeAttributes {
            clipped: false,
            inherits_transform: false,
        })
    );
}

#[test]
fn undo_caption_replacement_restores_displaced_text() {
    let mut scene = Scene::new();
    let cap = scene.insert(ShapeNode::new(
        id("undo_caption"),
        ShapeKind::Caption {
            resize: ResizeBehavior::IndependentSizes,
            preferred_text_rect: None,
        },
    ));
    let first = scene.insert(ShapeNode::new(
        id("undo_first"),
        ShapeKind::Text {
            content: "first".into(),
        },
    ));
    let second = scene.insert(ShapeNode::new(
        id("undo_second"),
        ShapeKind::Text {
            content: "second".into(),
        },
    ));
    scene.add_child(cap, first);

    let mut stack = CommandStack::new(100);
    stack.execute(
        &mut scene,
        SceneMutation::AddChild {
            parent: id("undo_caption"),
            child: id("undo_second"),
            edge: None,
        },
        "Replace caption",
    );
    assert_eq!(scene.shapes(cap), vec![second]);

    stack.undo(&mut scene);
    assert_eq!(scene.shapes(cap), vec![first]);
    assert_eq!(scene.parent(second), None);
}

#[test]
fn rejected_caption_child_leaves_no_undo_entry() {
    let mut scene = make_scene();
    scene.insert(ShapeNode::new(
        id("reject_caption"),
        ShapeKind::Caption {
            resize: ResizeBehavior::default(),
            preferred_text_rect: None,
        },
    ));
    let mut stack = CommandStack::new(100);

    let applied = stack.execute(
        &mut scene,
        SceneMutation::AddChild {
            parent: id("reject_caption"),
            child: id("box"),
            edge: None,
        },
        "Caption a rect",
    );
    assert!(!applied);
    assert!(!stack.can_undo());
    assert_eq!(scene.parent(idx(&scene, "box")), Some(idx(&scene, "left")));
}

#[test]
fn property_edits_roundtrip() {
    let mut scene = make_scene();
    let mut stack = CommandStack::new(100);
    let shape = idx(&scene, "box");

    stack.execute(
        &mut scene,
        SceneMutation::SetZIndex {
            id: id("box"),
            z_index: 7,
        },
        "Raise",
    );
    stack.execute(
        &mut scene,
        SceneMutation::SetVisible {
            id: id("box"),
            visible: false,
        },
        "Hide",
    );
    stack.execute(
        &mut scene,
        SceneMutation::SetClipped {
            parent: id("left"),
            child: id("box"),
            clipped: true,
        },
        "Clip",
    );
    let node = scene.node(shape).unwrap();
    assert_eq!(node.geometry.z_index, 7);
    assert!(!node.geometry.visible);
    assert!(scene.is_clipped(idx(&scene, "left"), shape));

    while stack.undo(&mut scene).is_some() {}
    let node = scene.node(shape).unwrap();
    assert_eq!(node.geometry.z_index, 0);
    assert!(node.geometry.visible);
    assert!(!scene.is_clipped(idx(&scene, "left"), shape));
}

#[test]
fn set_text_roundtrip() {
    let mut scene = Scene::new();
    let label = scene.insert(ShapeNode::new(
        id("undo_label"),
        ShapeKind::Text {
            content: "before".into(),
        },
    ));
    let mut stack = CommandStack::new(100);

    stack.execute(
        &mut scene,
        SceneMutation::SetText {
            id: id("undo_label"),
            content: "after".into(),
        },
        "Edit text",
    );
    assert_eq!(scene.node(label).unwrap().kind.text_content(), Some("after"));
    stack.undo(&mut scene);
    assert_eq!(scene.node(label).unwrap().kind.text_content(), Some("before"));
}

// ─── Drag gesture ───────────────────────────────────────────────────────

#[test]
fn tool_drag_undoes_in_one_step() {
    init_logger();
    let registry = ShapeRegistry::shared();
    let mut scene = Scene::new();
    let root = scene.insert_with_model(
        ShapeNode::new(id("drag_root"), ShapeKind::Layer),
        Rc::new(GenericModel::new().with_shape_manager(registry.clone())),
    );
    let shape = scene.insert(
        ShapeNode::new(id("drag_box"), ShapeKind::Rect).with_rect(Rect::new(0.0, 0.0, 40.0, 40.0)),
    );
    scene.add_child(root, shape);

    let mut tool = SelectTool::new();
    let mut stack = CommandStack::new(100);
    let items = paint_list(&mut scene, &registry);

    tool.handle(
        &InputEvent::PointerDown {
            x: 5.0,
            y: 5.0,
            pressure: 1.0,
            modifiers: Modifiers::NONE,
        },
        &scene,
        &items,
    );
    stack.begin_batch();
    for step in 1..=4 {
        let moves = tool.handle(
            &InputEvent::PointerMove {
                x: 5.0 + step as f64 * 10.0,
                y: 5.0,
                pressure: 1.0,
                modifiers: Modifiers::NONE,
            },
            &scene,
            &items,
        );
        for m in moves {
            stack.execute(&mut scene, m, "drag");
        }
    }
    tool.handle(
        &InputEvent::PointerUp {
            x: 45.0,
            y: 5.0,
            modifiers: Modifiers::NONE,
        },
        &scene,
        &items,
    );
    stack.end_batch();

    assert_eq!(scene.position(shape), Point::new(40.0, 0.0));
    stack.undo(&mut scene);
    assert_eq!(scene.position(shape), Point::ZERO);
    assert!(!stack.can_undo());
}

#[test]
fn non_editable_parent_pins_children() {
    let registry = ShapeRegistry::shared();
    let mut scene = Scene::new();
    let root = scene.insert_with_model(
        ShapeNode::new(id("pin_root"), ShapeKind::Layer),
        Rc::new(GenericModel::new().with_shape_manager(registry.clone())),
    );
    let group = scene.insert(ShapeNode::new(id("pin_group"), ShapeKind::Group));
    let shape = scene.insert(
        ShapeNode::new(id("pin_box"), ShapeKind::Rect).with_rect(Rect::new(0.0, 0.0, 40.0, 40.0)),
    );
    scene.add_child(group, shape);
    scene.add_child(root, group);
    scene.set_editable(group, false);

    let items = paint_list(&mut scene, &registry);
    let mut tool = SelectTool::new();
    tool.handle(
        &InputEvent::PointerDown {
            x: 5.0,
            y: 5.0,
            pressure: 1.0,
            modifiers: Modifiers::NONE,
        },
        &scene,
        &items,
    );
    assert_eq!(tool.selected, vec![id("pin_box")]);
    let moves = tool.handle(
        &InputEvent::PointerMove {
            x: 25.0,
            y: 5.0,
            pressure: 1.0,
            modifiers: Modifiers::NONE,
        },
        &scene,
        &items,
    );
    assert!(moves.is_empty());
}
