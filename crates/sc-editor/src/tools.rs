//! Tool system for canvas interactions.
//!
//! A tool translates pointer input into `SceneMutation`s; the host applies
//! them through a `CommandStack`, batching a drag between pointer-down and
//! pointer-up.
//!
//! ## Modifier behaviors
//!
//! | Modifier | Select Tool |
//! |----------|-------------|
//! | **Shift** | Toggle selection on click, axis-constrain drag, extend marquee |

use crate::input::InputEvent;
use crate::mutation::SceneMutation;
use kurbo::{Point, Rect, Vec2};
use sc_core::{Scene, ShapeId};
use sc_render::{PaintItem, hit_test, hit_test_rect};

pub struct SelectTool {
    /// Currently selected shape(s).
    pub selected: Vec<ShapeId>,
    /// Drag state (moving the selection).
    dragging: bool,
    last: Point,
    /// Set when pointer-down hits empty space.
    pub marquee_start: Option<Point>,
    /// Current marquee rectangle. Updated during drag.
    pub marquee_rect: Option<Rect>,
}

impl Default for SelectTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectTool {
    pub fn new() -> Self {
        Self {
            selected: Vec::new(),
            dragging: false,
            last: Point::ZERO,
            marquee_start: None,
            marquee_rect: None,
        }
    }

    pub fn first_selected(&self) -> Option<ShapeId> {
        self.selected.first().copied()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Handle a pointer event against the current paint list, returning
    /// zero or more mutations.
    pub fn handle(
        &mut self,
        event: &InputEvent,
        scene: &Scene,
        items: &[PaintItem],
    ) -> Vec<SceneMutation> {
        match *event {
            InputEvent::PointerDown { x, y, modifiers, .. } => {
                let point = Point::new(x, y);
                self.marquee_start = None;
                self.marquee_rect = None;

                let hit = hit_test(items, point).and_then(|idx| scene.id_of(idx));
                if let Some(hit_id) = hit {
                    if modifiers.shift {
                        if let Some(pos) = self.selected.iter().position(|id| *id == hit_id) {
                            self.selected.remove(pos);
                        } else {
                            self.selected.push(hit_id);
                        }
                    } else if !self.selected.contains(&hit_id) {
                        self.selected = vec![hit_id];
                    }
                    // Pressing on an already-selected shape keeps the selection for the drag.
                    self.dragging = true;
                    self.last = point;
                } else {
                    if !modifiers.shift {
                        self.selected.clear();
                    }
                    self.dragging = false;
                    self.marquee_start = Some(point);
                    self.marquee_rect = Some(Rect::from_points(point, point));
                }
                vec![]
            }
            InputEvent::PointerMove { x, y, modifiers, .. } => {
                let point = Point::new(x, y);
                if let Some(start) = self.marquee_start {
                    self.marquee_rect = Some(Rect::from_points(start, point));
                    return vec![];
                }
                if !self.dragging || self.selected.is_empty() {
                    return vec![];
                }

                let mut delta = point - self.last;
                self.last = point;
                if modifiers.shift {
                    if delta.x.abs() > delta.y.abs() {
                        delta.y = 0.0;
                    } else {
                        delta.x = 0.0;
                    }
                }
                self.moves_for(scene, delta)
            }
            InputEvent::PointerUp { .. } => {
                if let Some(rect) = self.marquee_rect.take() {
                    for idx in hit_test_rect(items, rect) {
                        if let Some(id) = scene.id_of(idx)
                            && !self.selected.contains(&id)
                        {
                            self.selected.push(id);
                        }
                    }
                }
                self.marquee_start = None;
                self.dragging = false;
                vec![]
            }
        }
    }

    /// One move per selected shape, skipping locked shapes and letting each
    /// parent model veto or clamp its child's delta.
    fn moves_for(&self, scene: &Scene, delta: Vec2) -> Vec<SceneMutation> {
        let mut moves = Vec::new();
        for &id in &self.selected {
            let Some(idx) = scene.index_of(id) else {
                continue;
            };
            if scene.is_child_locked(idx) {
                log::debug!("DRAG skipped locked {id}");
                continue;
            }
            let allowed = scene.propose_move(idx, delta);
            if allowed == Vec2::ZERO {
                continue;
            }
            moves.push(SceneMutation::MoveShape {
                id,
                dx: allowed.x,
                dy: allowed.y,
            });
        }
        moves
    }
}
