pub mod loader;
pub mod schema;

pub use loader::{extend_registry, load_from_path, load_from_str, ConfigError};
pub use schema::{
    AnchorDefinition, Metadata, ModuleQuery, TransformConfig, TransformDefinition,
    ValidationError, ValidationIssue,
};
