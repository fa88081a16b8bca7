//! Pipeline adapter: the per-module entry point for the surrounding build.
//!
//! A [`TransformPipeline`] is built once per build invocation from a fixed
//! target and an explicit list of descriptors. The bundler then calls
//! [`TransformPipeline::transform`] once per module. Descriptors that apply
//! to the same module run in registration order, each one seeing the text
//! the previous one produced; their position maps are composed so the
//! result always points back at the module text the bundler handed in.

use crate::position_map::PositionMap;
use crate::target::TargetEnvironment;
use crate::transform::{ModuleUnit, TransformDescriptor, TransformError};
use tracing::info;

/// Rewritten module ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedModule {
    pub text: String,
    pub position_map: PositionMap,
    /// Names of the descriptors that rewrote this module, in order
    pub applied: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TransformPipeline {
    target: TargetEnvironment,
    descriptors: Vec<TransformDescriptor>,
}

impl TransformPipeline {
    pub fn new(target: TargetEnvironment, descriptors: Vec<TransformDescriptor>) -> Self {
        Self {
            target,
            descriptors,
        }
    }

    pub fn target(&self) -> TargetEnvironment {
        self.target
    }

    pub fn descriptors(&self) -> &[TransformDescriptor] {
        &self.descriptors
    }

    /// Run every registered descriptor over one module.
    ///
    /// `Ok(None)` means no descriptor applied and the module passes through
    /// untouched.
    pub fn transform(
        &self,
        module_id: &str,
        module_text: &str,
    ) -> Result<Option<PatchedModule>, TransformError> {
        let mut current: Option<PatchedModule> = None;

        for descriptor in &self.descriptors {
            let input = current.as_ref().map_or(module_text, |patched| patched.text.as_str());
            let unit = ModuleUnit::new(module_id, input);

            let Some(output) = descriptor.try_apply(self.target, &unit)? else {
                continue;
            };

            info!(
                transform = %descriptor.name,
                module = module_id,
                target = %self.target,
                "module rewritten"
            );

            current = Some(match current {
                None => PatchedModule {
                    text: output.text,
                    position_map: output.position_map,
                    applied: vec![descriptor.name.clone()],
                },
                Some(mut previous) => {
                    previous.position_map = previous.position_map.compose(&output.position_map);
                    previous.text = output.text;
                    previous.applied.push(descriptor.name.clone());
                    previous
                }
            });
        }

        Ok(current)
    }

    /// Descriptors whose predicate accepts `module_id`, in registration order.
    pub fn applicable(&self, module_id: &str) -> impl Iterator<Item = &TransformDescriptor> + '_ {
        let module_id = module_id.to_string();
        self.descriptors
            .iter()
            .filter(move |descriptor| descriptor.applies_to(&module_id))
    }
}
