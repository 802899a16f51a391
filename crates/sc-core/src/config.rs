//! Tunables for the models that compute geometry.

use serde::{Deserialize, Serialize};

/// Spacing used by the diagram auto-layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagramConfig {
    /// Horizontal space between neighbouring children in the row.
    pub spacing: f64,

    /// Vertical space between the root and the row of children.
    pub vertical_gap: f64,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            spacing: 20.0,
            vertical_gap: 40.0,
        }
    }
}

impl DiagramConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_vertical_gap(mut self, gap: f64) -> Self {
        self.vertical_gap = gap;
        self
    }
}
