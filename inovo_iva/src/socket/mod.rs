//! TCP transport.
//!
//! The IVA runtime on the arm connects *to* the control process, so the
//! usual setup is a [`Listener`] that accepts one [`Stream`] per runtime
//! start. [`Stream::connect`] covers the client role, used by the
//! simulator.

mod listener;
mod stream;

pub use listener::*;
pub use stream::*;
