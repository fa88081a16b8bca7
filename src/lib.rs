//! Bundle Patcher: per-target specialization of compiled module scaffolding
//!
//! A single compiled module tree feeds several platform builds (server,
//! browser, browser with vendored fallbacks). Some modules carry
//! platform-neutral scaffolding that detects capabilities at load time;
//! this crate swaps that scaffolding for the right implementation ahead of
//! time and keeps a position map back to the original text.
//!
//! # Architecture
//!
//! Every rewrite compiles down to a single primitive: [`Edit`], a verified
//! byte-span replacement. A [`TransformDescriptor`] decides where the edit
//! goes (a module-id predicate and a literal [`Anchor`]) and what it contains
//! (one replacement per [`TargetEnvironment`]). The [`TransformPipeline`] runs
//! an explicit list of descriptors over each module and composes the
//! resulting [`PositionMap`]s.
//!
//! # Failure model
//!
//! - A module no descriptor applies to passes through untouched
//! - An applicable descriptor whose anchor is missing fails the build
//! - An applicable descriptor without a replacement for the active target
//!   fails the build
//!
//! # Example
//!
//! ```
//! use bundle_patcher::{builtin, TargetEnvironment, TransformPipeline};
//!
//! let target = TargetEnvironment::Browser;
//! let pipeline = TransformPipeline::new(target, builtin::registry(target));
//!
//! let source = format!("{}\nexport {{ randomBytesSource }};\n", builtin::RANDOM_SOURCE_ANCHOR);
//! let patched = pipeline
//!     .transform("dist/runtime/random.js", &source)?
//!     .expect("random source module is rewritten");
//! assert!(patched.text.starts_with(builtin::RANDOM_SOURCE_BROWSER));
//!
//! assert!(pipeline.transform("dist/index.js", "export {};\n")?.is_none());
//! # Ok::<(), bundle_patcher::TransformError>(())
//! ```

pub mod builtin;
pub mod config;
pub mod edit;
pub mod pipeline;
pub mod position_map;
pub mod safety;
pub mod target;
pub mod transform;
pub mod tree;

// Re-exports
pub use config::{
    extend_registry, load_from_path, load_from_str, ConfigError, TransformConfig,
};
pub use edit::{apply_edits, Edit, EditError, EditVerification};
pub use pipeline::{PatchedModule, TransformPipeline};
pub use position_map::{PositionMap, Segment, SegmentKind};
pub use safety::{OutputGuard, SafetyError};
pub use sourcemap::SourceMap;
pub use target::{ParseTargetError, TargetEnvironment};
pub use transform::{
    try_apply, Anchor, DriftHint, ModuleMatcher, ModuleUnit, RewriteOutput, TransformDescriptor,
    TransformError,
};
pub use tree::{check_tree, plan_tree, write_plan, TreeError, TreePlan, WriteSummary};
