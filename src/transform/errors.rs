use crate::edit::EditError;
use crate::target::TargetEnvironment;
use thiserror::Error;

/// Lines scoring below this are not worth suggesting.
const HINT_THRESHOLD: f64 = 0.6;

/// Fatal rewrite failures. Any of these aborts the whole build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("transform '{transform}' did not find its anchor in module '{module_id}'; expected literal text:\n{anchor}")]
    MissingAnchor {
        transform: String,
        module_id: String,
        anchor: String,
    },

    #[error("transform '{transform}' has no replacement for target '{target}' (module '{module_id}')")]
    UnsupportedTarget {
        transform: String,
        module_id: String,
        target: TargetEnvironment,
    },

    #[error("transform '{transform}' produced an invalid edit for module '{module_id}': {source}")]
    Edit {
        transform: String,
        module_id: String,
        #[source]
        source: EditError,
    },
}

impl TransformError {
    /// Name of the descriptor that failed.
    pub fn transform(&self) -> &str {
        match self {
            TransformError::MissingAnchor { transform, .. }
            | TransformError::UnsupportedTarget { transform, .. }
            | TransformError::Edit { transform, .. } => transform,
        }
    }

    /// Id of the module being rewritten.
    pub fn module_id(&self) -> &str {
        match self {
            TransformError::MissingAnchor { module_id, .. }
            | TransformError::UnsupportedTarget { module_id, .. }
            | TransformError::Edit { module_id, .. } => module_id,
        }
    }
}

/// The module line that most resembles the first line of a missing anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftHint {
    /// 1-based line number in the module
    pub line: usize,
    pub text: String,
    /// Normalized Levenshtein similarity in `[0, 1]`
    pub similarity: f64,
}

impl TransformError {
    /// For a [`TransformError::MissingAnchor`], find where the anchor
    /// probably drifted to in `module_text`.
    ///
    /// Purely diagnostic; matching itself stays exact.
    pub fn drift_hint(&self, module_text: &str) -> Option<DriftHint> {
        let TransformError::MissingAnchor { anchor, .. } = self else {
            return None;
        };
        let needle = anchor.lines().map(str::trim).find(|line| !line.is_empty())?;

        module_text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| DriftHint {
                line: idx + 1,
                text: line.to_string(),
                similarity: strsim::normalized_levenshtein(needle, line.trim()),
            })
            .filter(|hint| hint.similarity >= HINT_THRESHOLD)
            .max_by(|a, b| a.similarity.total_cmp(&b.similarity).then(b.line.cmp(&a.line)))
    }
}
