//! Spec layer: JSON schema + validated in-memory structures.
//!
//! This module is intentionally separate from the engine and rendering.
//! It owns the transform.json shapes and their validation into a
//! Transformation.

pub mod transform;

pub use transform::{RawInput, RawOperation, RawTerm, TransformSpec, load};
