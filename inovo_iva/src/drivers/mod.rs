#[cfg(feature="driver")]
mod driver;
#[cfg(feature="driver")]
pub use driver::*;

mod context;
pub use context::*;

mod driver_config;
pub use driver_config::*;
