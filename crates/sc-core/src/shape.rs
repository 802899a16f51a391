//! Shape nodes: the leaves and inner nodes of the ownership tree.
//!
//! A `ShapeNode` carries geometry (position, size, affine transform,
//! z-index, visibility) and, when it is a container, the `ContainerModel`
//! that owns its children. Parent links live in the `Scene` arena, never on
//! the node itself.

use crate::id::ShapeId;
use crate::model::ContainerModel;
use kurbo::{Affine, Point, Rect, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

// ─── Change kinds ────────────────────────────────────────────────────────

/// What changed on a shape. Delivered to the shape itself, to its own model
/// (when it is a container) and to its parent's model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    PositionChanged,
    RotationChanged,
    ScaleChanged,
    ShearChanged,
    SizeChanged,
    GenericMatrixChanged,
    /// A shape-specific parameter (connector endpoints, path commands).
    ParameterChanged,
    ClipPathChanged,
    ClipMaskChanged,
    /// Text or other inner content.
    ContentChanged,
    /// Fill, stroke and other paint-only properties.
    StyleChanged,
    VisibilityChanged,
    ZIndexChanged,
    ParentChanged,
    /// Something inside a child container changed.
    ChildChanged,
    ProtectionChanged,
}

impl ChangeKind {
    /// Kinds that alter the shape's geometry matrix or extent.
    /// Only these are forwarded to a container's own model.
    pub fn is_geometric(self) -> bool {
        matches!(
            self,
            ChangeKind::RotationChanged
                | ChangeKind::ScaleChanged
                | ChangeKind::ShearChanged
                | ChangeKind::SizeChanged
                | ChangeKind::PositionChanged
                | ChangeKind::GenericMatrixChanged
        )
    }

    /// Kinds that can move a child's outline inside its parent.
    pub fn affects_outline(self) -> bool {
        self.is_geometric()
            || matches!(
                self,
                ChangeKind::ParameterChanged
                    | ChangeKind::ClipPathChanged
                    | ChangeKind::ClipMaskChanged
            )
    }
}

// ─── Shape kinds ─────────────────────────────────────────────────────────

/// A single path command (SVG-like but simplified).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    QuadTo(f64, f64, f64, f64),            // control, end
    CubicTo(f64, f64, f64, f64, f64, f64), // c1, c2, end
    Close,
}

/// How a caption container and its text child size each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeBehavior {
    /// The text child always takes the container's size.
    #[default]
    TextFollowsSize,
    /// The container grows to the text child's size when the text resizes.
    ShapeFollowsText,
    /// Neither side follows the other.
    IndependentSizes,
    /// The text child is placed in `preferred_text_rect`; container resizes
    /// do not touch it.
    TextFollowsPreferredTextRect,
}

/// The kinds of shapes in the tree. The last four are containers and are
/// created with a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Rect,
    Ellipse,
    Path {
        commands: Vec<PathCmd>,
    },
    /// Text label. The only kind with the "has text content" capability.
    Text {
        content: String,
    },
    /// A line between two points in the parent's coordinates.
    Connector {
        start: Point,
        end: Point,
    },
    /// Plain group with a cached bounding box.
    Group,
    /// Top-level layer; usually the root that carries a shape manager.
    Layer,
    /// Shape with a single text caption.
    Caption {
        resize: ResizeBehavior,
        preferred_text_rect: Option<Rect>,
    },
    /// Auto-laid-out root/children diagram.
    Diagram,
}

impl ShapeKind {
    /// The text content, if this kind carries one.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            ShapeKind::Text { content } => Some(content),
            _ => None,
        }
    }

    /// Prefix used when generating ids for this kind.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Path { .. } => "path",
            ShapeKind::Text { .. } => "text",
            ShapeKind::Connector { .. } => "connector",
            ShapeKind::Group => "group",
            ShapeKind::Layer => "layer",
            ShapeKind::Caption { .. } => "caption",
            ShapeKind::Diagram => "diagram",
        }
    }
}

// ─── Geometry ────────────────────────────────────────────────────────────

/// Mutable geometry of a shape. `transform` is applied after translating to
/// `position`, in the parent's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub position: Point,
    pub size: Size,
    pub transform: Affine,
    pub z_index: i32,
    pub visible: bool,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            position: Point::ZERO,
            size: Size::ZERO,
            transform: Affine::IDENTITY,
            z_index: 0,
            visible: true,
        }
    }
}

impl Geometry {
    pub fn with_rect(rect: Rect) -> Self {
        Self {
            position: rect.origin(),
            size: rect.size(),
            ..Self::default()
        }
    }

    /// `translate(position) * transform`.
    pub fn local_transform(&self) -> Affine {
        Affine::translate(self.position.to_vec2()) * self.transform
    }

    /// The untransformed outline rectangle `(0, 0, w, h)`.
    pub fn outline_rect(&self) -> Rect {
        Rect::from_origin_size(Point::ZERO, self.size)
    }
}

// ─── Shape node ──────────────────────────────────────────────────────────

/// A single shape in the scene arena.
pub struct ShapeNode {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub geometry: Geometry,

    /// Geometry-protected shapes refuse interactive moves and resizes.
    pub geometry_protected: bool,

    /// Non-editable shapes pin their whole subtree in place.
    pub editable: bool,

    /// Bumped by `notify_changed`; read by rendering and caching collaborators.
    revision: u64,
    last_change: Option<ChangeKind>,

    /// Present iff this node is a container.
    pub(crate) model: Option<Rc<dyn ContainerModel>>,
}

impl ShapeNode {
    pub fn new(id: ShapeId, kind: ShapeKind) -> Self {
        Self {
            id,
            kind,
            geometry: Geometry::default(),
            geometry_protected: false,
            editable: true,
            revision: 0,
            last_change: None,
            model: None,
        }
    }

    /// A node with an auto-generated id.
    pub fn anonymous(kind: ShapeKind) -> Self {
        let id = ShapeId::generate(kind.id_prefix());
        Self::new(id, kind)
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.geometry = Geometry::with_rect(rect);
        self
    }

    pub fn is_container(&self) -> bool {
        self.model.is_some()
    }

    pub fn has_text_content(&self) -> bool {
        self.kind.text_content().is_some()
    }

    pub fn model(&self) -> Option<&Rc<dyn ContainerModel>> {
        self.model.as_ref()
    }

    /// Tell this shape's own collaborators that `kind` changed.
    /// Does not walk the tree.
    pub fn notify_changed(&mut self, kind: ChangeKind) {
        self.revision += 1;
        self.last_change = Some(kind);
        log::trace!("CHANGED {} {:?} rev={}", self.id, kind, self.revision);
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_change(&self) -> Option<ChangeKind> {
        self.last_change
    }
}

impl fmt::Debug for ShapeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeNode")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("geometry", &self.geometry)
            .field("geometry_protected", &self.geometry_protected)
            .field("editable", &self.editable)
            .field("revision", &self.revision)
            .field("model", &self.model)
            .finish()
    }
}
