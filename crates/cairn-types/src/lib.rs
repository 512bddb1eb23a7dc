//! Foundation types for cairn.
//!
//! Every other cairn crate depends on `cairn-types` for the two values that
//! identify stored content: the [`ObjectId`] (a SHA-1 digest) and the
//! [`ObjectKind`] that participates in computing it.

pub mod error;
pub mod kind;
pub mod object;

pub use error::TypeError;
pub use kind::ObjectKind;
pub use object::{ObjectId, OBJECT_ID_LEN};
