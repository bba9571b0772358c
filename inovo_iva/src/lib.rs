//! Control library for Inovo robot arms over the IVA line protocol.
//!
//! The arm runs an IVA runtime procedure that connects back to the control
//! process and executes one JSON instruction per line, replying `OK` or a
//! payload. This crate provides:
//!
//! * [`geometry`]: poses ([`Transform`](geometry::Transform)) and joint
//!   coordinates, with the transform algebra used to build targets.
//! * [`commands`] and [`packets`]: immutable instruction descriptors.
//! * [`codec`]: field map to wire line and reply decoding.
//! * [`socket`]: the TCP listener and line stream (feature `driver`).
//! * [`drivers`]: the [`InovoRobot`](drivers::InovoRobot) session with its
//!   context stack, and [`IvaConfig`](drivers::IvaConfig).
//! * [`bridge`]: the interface to the controller's service bridge.

// Extract module must be declared first so the macro is available to other modules
#[macro_use]
mod extract;
pub use extract::ExtractInner;

pub mod bridge;
pub mod codec;
pub mod commands;
pub mod drivers;
pub mod errors;
pub mod geometry;
pub mod logger;
pub mod packets;
#[cfg(feature = "driver")]
pub mod socket;

pub use errors::*;

/// Common imports for driving an arm.
pub mod prelude {
    pub use crate::bridge::{ControllerBridge, Service, ServiceResponse};
    pub use crate::codec::Response;
    pub use crate::commands::{
        IntoRobotCommand, IoTarget, MotionMode, MotionParameters, RobotCommand,
    };
    #[cfg(feature = "driver")]
    pub use crate::drivers::InovoRobot;
    pub use crate::drivers::IvaConfig;
    pub use crate::geometry::{JointCoord, Transform};
    pub use crate::{ExtractInner, IvaError};
}
