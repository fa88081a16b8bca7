use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps emitted files inside the output root.
///
/// Module ids come from the input tree and are turned into output paths; an
/// id with `..` or an absolute path must not be able to write elsewhere.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    /// Canonical path to the output root
    output_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("module id escapes output directory: {module_id} (output: {output})")]
    EscapesOutput { module_id: String, output: PathBuf },

    #[error("output directory {output} overlaps input directory {input}")]
    OverlappingTrees { input: PathBuf, output: PathBuf },

    #[error("failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

impl OutputGuard {
    /// Create the output root if needed and guard it.
    ///
    /// `input_root` must already exist; the two trees may not contain one
    /// another, otherwise a second run would pick up its own output.
    pub fn new(input_root: impl AsRef<Path>, output_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let input_root = input_root.as_ref().canonicalize()?;
        fs::create_dir_all(output_root.as_ref())?;
        let output_root = output_root.as_ref().canonicalize()?;

        if output_root.starts_with(&input_root) || input_root.starts_with(&output_root) {
            return Err(SafetyError::OverlappingTrees {
                input: input_root,
                output: output_root,
            });
        }

        Ok(Self { output_root })
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Output path for a module id, rejecting ids that would leave the root.
    pub fn module_path(&self, module_id: &str) -> Result<PathBuf, SafetyError> {
        let relative = Path::new(module_id);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });

        if escapes || module_id.is_empty() {
            return Err(SafetyError::EscapesOutput {
                module_id: module_id.to_string(),
                output: self.output_root.clone(),
            });
        }

        Ok(self.output_root.join(relative))
    }
}
