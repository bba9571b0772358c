//! Typed extraction of payloads from reply enums.
//!
//! # Example
//!
//! ```
//! use inovo_iva::ExtractInner;
//! use inovo_iva::codec::{decode_response, ResponseKind};
//! use inovo_iva::geometry::Transform;
//!
//! let reply = decode_response(
//!     "{x : 0.1, y : 0.2, z : 0.3, rx : 0.0, ry : 0.0, rz : 0.0}",
//!     ResponseKind::Transform,
//! ).unwrap();
//!
//! // The target type picks the variant.
//! let pose: Option<&Transform> = reply.as_inner();
//! assert!(pose.is_some());
//! ```

/// Borrow or take the inner value of one enum variant, selected by type.
///
/// Implemented with [`impl_extract_inner!`]; the variant must be the only one
/// of the enum carrying `T`.
pub trait ExtractInner<T> {
    /// `Some(&T)` if the enum holds the variant carrying `T`.
    fn as_inner(&self) -> Option<&T>;

    /// Consuming form of [`as_inner`](ExtractInner::as_inner).
    fn into_inner(self) -> Option<T>;

    /// # Panics
    ///
    /// Panics with `msg` when the variant does not match.
    #[inline]
    fn expect_inner(&self, msg: &str) -> &T {
        self.as_inner().expect(msg)
    }
}

/// Implements [`ExtractInner`] for one `(enum, variant, inner type)` triple.
///
/// ```ignore
/// impl_extract_inner!(Response, Transform, Transform);
/// ```
#[macro_export]
macro_rules! impl_extract_inner {
    ($enum:ty, $variant:ident, $inner:ty) => {
        impl $crate::ExtractInner<$inner> for $enum {
            #[inline]
            fn as_inner(&self) -> Option<&$inner> {
                match self {
                    Self::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            #[inline]
            fn into_inner(self) -> Option<$inner> {
                match self {
                    Self::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}
