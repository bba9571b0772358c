//! Wire-level data: the flat field map every message is made of and the
//! instruction envelope that wraps command descriptors.

mod field_map;
mod instruction;

pub use field_map::*;
pub use instruction::*;
