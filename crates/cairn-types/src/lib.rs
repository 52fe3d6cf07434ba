//! Foundation types for cairn.
//!
//! Every other cairn crate depends on `cairn-types` for the identifier that
//! names stored content.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`TypeError`]: Parse failures for identifiers

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
