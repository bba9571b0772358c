//! Command descriptors.
//!
//! Every descriptor is an immutable value that renders to an ordered
//! [`FieldMap`](crate::packets::FieldMap). Validation happens in the
//! constructors, so a descriptor that exists is always safe to send.

mod gripper_command;
mod io_command;
mod robot_command;

pub use gripper_command::*;
pub use io_command::*;
pub use robot_command::*;
