//! Transform descriptors and the engine that applies them.
//!
//! A [`TransformDescriptor`] names the modules it applies to, the literal
//! anchor it expects to find in them, and the replacement text for each
//! [`TargetEnvironment`](crate::TargetEnvironment). The engine applies one
//! descriptor to one module and either declines, returns the patched text
//! with its position map, or fails the build.

pub mod descriptor;
pub mod engine;
pub mod errors;

pub use descriptor::{Anchor, ModuleMatcher, TransformDescriptor};
pub use engine::{try_apply, ModuleUnit, RewriteOutput};
pub use errors::{DriftHint, TransformError};
