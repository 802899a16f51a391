pub mod hit;
pub mod paint;
pub mod registry;

pub use hit::{hit_test, hit_test_rect};
pub use paint::{PaintItem, paint_list};
pub use registry::ShapeRegistry;
