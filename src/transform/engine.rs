//! Rewrite engine: one descriptor, one module, one edit.

use crate::edit::{apply_edits, Edit};
use crate::position_map::PositionMap;
use crate::target::TargetEnvironment;
use crate::transform::descriptor::{Anchor, TransformDescriptor};
use crate::transform::errors::TransformError;
use tracing::{debug, trace};

/// A compiled module as offered by the surrounding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleUnit<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

impl<'a> ModuleUnit<'a> {
    pub fn new(id: &'a str, text: &'a str) -> Self {
        Self { id, text }
    }
}

/// Patched module text plus the map back to the text it was patched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub text: String,
    pub position_map: PositionMap,
}

/// Apply `descriptor` to `unit` for `target`.
///
/// Returns `Ok(None)` when the descriptor does not apply to the module id.
/// A missing anchor or an uncovered target is a hard error: the descriptor
/// was written against scaffolding that no longer looks the way it expects.
pub fn try_apply(
    descriptor: &TransformDescriptor,
    target: TargetEnvironment,
    unit: &ModuleUnit<'_>,
) -> Result<Option<RewriteOutput>, TransformError> {
    if !descriptor.applies_to(unit.id) {
        trace!(transform = %descriptor.name, module = unit.id, "not applicable");
        return Ok(None);
    }

    let (byte_start, byte_end) =
        descriptor
            .anchor
            .locate(unit.text)
            .ok_or_else(|| TransformError::MissingAnchor {
                transform: descriptor.name.clone(),
                module_id: unit.id.to_string(),
                anchor: descriptor.anchor.expected_text().to_string(),
            })?;

    let replacement =
        descriptor
            .replacement_for(target)
            .ok_or_else(|| TransformError::UnsupportedTarget {
                transform: descriptor.name.clone(),
                module_id: unit.id.to_string(),
                target,
            })?;

    debug!(
        transform = %descriptor.name,
        module = unit.id,
        %target,
        byte_start,
        byte_end,
        "anchor located"
    );

    let edit = match &descriptor.anchor {
        Anchor::Literal(literal) => Edit::new(byte_start, byte_end, replacement, literal),
        Anchor::Prepend => Edit::prepend(replacement),
    };
    let edits = [edit];

    let to_transform_error = |source| TransformError::Edit {
        transform: descriptor.name.clone(),
        module_id: unit.id.to_string(),
        source,
    };
    let text = apply_edits(unit.text, &edits).map_err(to_transform_error)?;
    let position_map = PositionMap::build(unit.text, &edits).map_err(to_transform_error)?;

    Ok(Some(RewriteOutput { text, position_map }))
}

impl TransformDescriptor {
    /// Method form of [`try_apply`].
    pub fn try_apply(
        &self,
        target: TargetEnvironment,
        unit: &ModuleUnit<'_>,
    ) -> Result<Option<RewriteOutput>, TransformError> {
        try_apply(self, target, unit)
    }
}
