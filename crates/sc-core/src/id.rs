use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

static NAMES: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Suffix counter shared by every generated name.
static NEXT_GENERATED: AtomicU64 = AtomicU64::new(1);

/// Separator between a kind prefix and its counter. `#` never appears in a
/// user-given name accepted by `ShapeId::named`, so generated names can be
/// told apart.
const GENERATED_SEP: char = '#';

/// Stable, human-readable name of a shape.
///
/// The tree itself stores arena handles (`ShapeIndex`); commands and tools
/// address shapes by `ShapeId` so that a recorded mutation still resolves
/// after the arena slot has been reused. Copy, 4 bytes, O(1) compare.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(Spur);

impl ShapeId {
    /// The id for `name`, interning it on first use.
    pub fn intern(name: &str) -> Self {
        ShapeId(NAMES.get_or_intern(name))
    }

    /// Like `intern`, but refuses names that collide with generated ones.
    pub fn named(name: &str) -> Option<Self> {
        (!name.is_empty() && !name.contains(GENERATED_SEP)).then(|| Self::intern(name))
    }

    /// A fresh id such as `rect#12`.
    pub fn generate(prefix: &str) -> Self {
        let n = NEXT_GENERATED.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}{GENERATED_SEP}{n}"))
    }

    pub fn as_str(&self) -> &str {
        NAMES.resolve(&self.0)
    }

    /// True for ids produced by `generate`.
    pub fn is_generated(&self) -> bool {
        self.as_str().contains(GENERATED_SEP)
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serialize for ShapeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShapeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ShapeId::intern(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_name_same_id() {
        let a = ShapeId::intern("caption_box");
        let b = ShapeId::intern("caption_box");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "caption_box");
        assert_eq!(a.to_string(), "@caption_box");
    }

    #[test]
    fn generated_ids_are_unique_and_marked() {
        let a = ShapeId::generate("rect");
        let b = ShapeId::generate("rect");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("rect#"));
        assert!(a.is_generated());
        assert!(!ShapeId::intern("plain").is_generated());
    }

    #[test]
    fn named_rejects_generated_shapes() {
        assert!(ShapeId::named("title").is_some());
        assert!(ShapeId::named("rect#3").is_none());
        assert!(ShapeId::named("").is_none());
    }
}
