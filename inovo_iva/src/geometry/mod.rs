//! Geometric value types used as motion targets.

mod joint_coord;
mod transform;

pub use joint_coord::*;
pub use transform::*;
