mod iva_error;

pub use iva_error::*;
