//! Undo history for scene edits.
//!
//! `CommandStack::execute` records each applied `SceneMutation` together with
//! the mutations that reverse it, captured from the scene before the edit.
//!
//! Drag gestures are batched: every mutation between `begin_batch` and
//! `end_batch` is applied live, and the whole gesture becomes one undo step
//! whose inverse replays the collected inverses newest-first.

use crate::mutation::{SceneMutation, apply_mutation, text_of};
use sc_core::{EdgeAttributes, Scene, ShapeId};
use smallvec::{SmallVec, smallvec};

/// Inverse of one mutation, in application order. Usually a single entry;
/// an add that displaces a caption also restores the displaced shape.
pub type Inverse = SmallVec<[SceneMutation; 2]>;

/// A command that captures both the forward mutation(s) and the inverse.
#[derive(Debug, Clone)]
pub enum Command {
    /// One mutation applied outside a batch.
    Single {
        forward: Box<SceneMutation>,
        inverse: Inverse,
        description: String,
    },
    /// Everything applied during one gesture.
    Batch {
        forward: Vec<SceneMutation>,
        inverse: Vec<SceneMutation>,
        description: String,
    },
}

impl Command {
    pub fn description(&self) -> &str {
        match self {
            Command::Single { description, .. } | Command::Batch { description, .. } => {
                description
            }
        }
    }
}

#[derive(Debug, Default)]
struct PendingBatch {
    forward: Vec<SceneMutation>,
    /// Inverses of `forward`, newest first.
    inverse: Vec<SceneMutation>,
    description: Option<String>,
}

/// Undo and redo history, with nested batches for drag gestures.
#[derive(Debug)]
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Maximum undo depth.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    batch: PendingBatch,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
            batch_depth: 0,
            batch: PendingBatch::default(),
        }
    }

    /// Start a batch group. All mutations until `end_batch()` are applied
    /// live but tracked as one atomic undo step.
    pub fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            self.batch = PendingBatch::default();
        }
        self.batch_depth += 1;
    }

    /// End a batch group. When the outermost batch closes, if any
    /// mutations occurred, push one command to the undo stack.
    pub fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }
        let batch = std::mem::take(&mut self.batch);
        if batch.forward.is_empty() {
            return;
        }
        log::debug!("BATCH closed with {} mutations", batch.forward.len());
        self.push(Command::Batch {
            forward: batch.forward,
            inverse: batch.inverse,
            description: batch.description.unwrap_or_else(|| "canvas edit".to_string()),
        });
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Execute a mutation against the scene and push it to the undo stack.
    /// Returns `false` (and records nothing) if the scene refused it.
    pub fn execute(
        &mut self,
        scene: &mut Scene,
        mutation: SceneMutation,
        description: &str,
    ) -> bool {
        let inverse = compute_inverse(scene, &mutation);
        if !apply_mutation(scene, &mutation) {
            log::debug!("EXECUTE {description:?} had no effect; not recorded");
            return false;
        }

        if self.batch_depth > 0 {
            // Newest first: prepend this mutation's inverse as a block.
            self.batch.inverse.splice(0..0, inverse);
            self.batch.forward.push(mutation);
            self.batch
                .description
                .get_or_insert_with(|| description.to_string());
            return true;
        }

        self.push(Command::Single {
            forward: Box::new(mutation),
            inverse,
            description: description.to_string(),
        });
        true
    }

    fn push(&mut self, cmd: Command) {
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // A fresh edit forks history.
        self.redo_stack.clear();
    }

    /// Undo the last command (or batch).
    pub fn undo(&mut self, scene: &mut Scene) -> Option<String> {
        let cmd = self.undo_stack.pop()?;
        match &cmd {
            Command::Single { inverse, .. } => apply_all(scene, inverse),
            Command::Batch { inverse, .. } => apply_all(scene, inverse),
        }
        let desc = cmd.description().to_string();
        self.redo_stack.push(cmd);
        Some(desc)
    }

    /// Redo the last undone command (or batch).
    pub fn redo(&mut self, scene: &mut Scene) -> Option<String> {
        let cmd = self.redo_stack.pop()?;
        match &cmd {
            Command::Single { forward, .. } => {
                apply_mutation(scene, forward);
            }
            Command::Batch { forward, .. } => apply_all(scene, forward),
        }
        let desc = cmd.description().to_string();
        self.undo_stack.push(cmd);
        Some(desc)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}

fn apply_all(scene: &mut Scene, mutations: &[SceneMutation]) {
    for m in mutations {
        if !apply_mutation(scene, m) {
            log::warn!("UNDO step for {} could not be applied", m.target());
        }
    }
}

/// The attributes of the edge currently above `child`, with its parent id.
fn current_edge(scene: &Scene, child: ShapeId) -> Option<(ShapeId, EdgeAttributes)> {
    let idx = scene.index_of(child)?;
    let parent = scene.parent(idx)?;
    Some((scene.id_of(parent)?, scene.edge_attributes(idx)?))
}

/// Compute the inverse mutation(s) needed to undo `mutation`.
/// Must run before `mutation` is applied.
fn compute_inverse(scene: &Scene, mutation: &SceneMutation) -> Inverse {
    match mutation {
        SceneMutation::AddChild { parent, child, .. } => {
            let mut inverse: Inverse = match current_edge(scene, *child) {
                // Already there: restore the old edge attributes.
                Some((old_parent, edge)) if old_parent == *parent => {
                    smallvec![SceneMutation::AddChild {
                        parent: *parent,
                        child: *child,
                        edge: Some(edge),
                    }]
                }
                // Re-parenting: put it back where it was.
                Some((old_parent, edge)) => smallvec![SceneMutation::AddChild {
                    parent: old_parent,
                    child: *child,
                    edge: Some(edge),
                }],
                None => smallvec![SceneMutation::RemoveChild {
                    parent: *parent,
                    child: *child,
                }],
            };
            // A single-slot container evicts its current member.
            let displaced = scene
                .index_of(*parent)
                .zip(scene.index_of(*child))
                .and_then(|(p, c)| scene.model_of(p)?.displaced_by(c))
                .and_then(|d| Some((scene.id_of(d)?, scene.edge_attributes(d)?)));
            if let Some((displaced, edge)) = displaced {
                inverse.push(SceneMutation::AddChild {
                    parent: *parent,
                    child: displaced,
                    edge: Some(edge),
                });
            }
            inverse
        }
        SceneMutation::RemoveChild { parent, child } => {
            let edge = current_edge(scene, *child).map(|(_, edge)| edge);
            smallvec![SceneMutation::AddChild {
                parent: *parent,
                child: *child,
                edge,
            }]
        }
        SceneMutation::MoveShape { id, dx, dy } => smallvec![SceneMutation::MoveShape {
            id: *id,
            dx: -dx,
            dy: -dy,
        }],
        SceneMutation::ResizeShape { id, .. } => {
            // Capture current size before mutation
            let size = scene
                .index_of(*id)
                .map(|idx| scene.size(idx))
                .unwrap_or_default();
            smallvec![SceneMutation::ResizeShape {
                id: *id,
                width: size.width,
                height: size.height,
            }]
        }
        SceneMutation::SetClipped { parent, child, .. } => {
            let clipped = current_edge(scene, *child).is_some_and(|(_, e)| e.clipped);
            smallvec![SceneMutation::SetClipped {
                parent: *parent,
                child: *child,
                clipped,
            }]
        }
        SceneMutation::SetInheritsTransform { parent, child, .. } => {
            let inherit = current_edge(scene, *child).is_none_or(|(_, e)| e.inherits_transform);
            smallvec![SceneMutation::SetInheritsTransform {
                parent: *parent,
                child: *child,
                inherit,
            }]
        }
        SceneMutation::SetZIndex { id, .. } => {
            let z_index = scene.get_by_id(*id).map_or(0, |n| n.geometry.z_index);
            smallvec![SceneMutation::SetZIndex { id: *id, z_index }]
        }
        SceneMutation::SetVisible { id, .. } => {
            let visible = scene.get_by_id(*id).is_none_or(|n| n.geometry.visible);
            smallvec![SceneMutation::SetVisible { id: *id, visible }]
        }
        SceneMutation::SetText { id, .. } => {
            let content = text_of(scene, *id).unwrap_or_default();
            smallvec![SceneMutation::SetText { id: *id, content }]
        }
    }
}
