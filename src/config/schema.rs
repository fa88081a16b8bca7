use crate::target::TargetEnvironment;
use crate::transform::{Anchor, ModuleMatcher, TransformDescriptor};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct TransformConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub transforms: Vec<TransformDefinition>,
}

impl TransformConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.transforms.is_empty() {
            issues.push(ValidationIssue::EmptyTransformList);
        }

        let mut seen = HashSet::new();
        for transform in &self.transforms {
            let id = transform.id.trim();
            if id.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: None,
                    field: "id",
                });
            } else if !seen.insert(id) {
                issues.push(ValidationIssue::DuplicateId(id.to_string()));
            }
            let transform_id = (!id.is_empty()).then(|| id.to_string());

            if transform.module.value().trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: transform_id.clone(),
                    field: "module.value",
                });
            }

            if let AnchorDefinition::Literal { text } = &transform.anchor {
                if text.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        transform_id: transform_id.clone(),
                        field: "anchor.text",
                    });
                }
            }

            if transform.replacements.is_empty() {
                issues.push(ValidationIssue::MissingField {
                    transform_id: transform_id.clone(),
                    field: "replacements",
                });
            }
            for target in transform.replacements.keys() {
                if target.parse::<TargetEnvironment>().is_err() {
                    issues.push(ValidationIssue::UnknownTarget {
                        transform_id: transform_id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Convert to descriptors, preserving file order.
    pub fn to_descriptors(&self) -> Result<Vec<TransformDescriptor>, ValidationError> {
        self.validate()?;
        Ok(self
            .transforms
            .iter()
            .map(TransformDefinition::to_descriptor)
            .collect())
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransformDefinition {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub module: ModuleQuery,
    pub anchor: AnchorDefinition,
    /// Target name to replacement text; names are checked by `validate`
    #[serde(default)]
    pub replacements: BTreeMap<String, String>,
}

impl TransformDefinition {
    fn to_descriptor(&self) -> TransformDescriptor {
        let anchor = match &self.anchor {
            AnchorDefinition::Literal { text } => Anchor::Literal(text.clone()),
            AnchorDefinition::Prepend => Anchor::Prepend,
        };
        let mut descriptor =
            TransformDescriptor::new(self.id.trim(), self.module.to_matcher(), anchor);
        descriptor.description = self.description.clone();
        for (target, text) in &self.replacements {
            if let Ok(target) = target.parse::<TargetEnvironment>() {
                descriptor.replacements.insert(target, text.clone());
            }
        }
        descriptor
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModuleQuery {
    Exact { value: String },
    Suffix { value: String },
    Contains { value: String },
}

impl ModuleQuery {
    pub fn value(&self) -> &str {
        match self {
            ModuleQuery::Exact { value }
            | ModuleQuery::Suffix { value }
            | ModuleQuery::Contains { value } => value,
        }
    }

    pub fn to_matcher(&self) -> ModuleMatcher {
        match self {
            ModuleQuery::Exact { value } => ModuleMatcher::Exact(value.clone()),
            ModuleQuery::Suffix { value } => ModuleMatcher::Suffix(value.clone()),
            ModuleQuery::Contains { value } => ModuleMatcher::Contains(value.clone()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnchorDefinition {
    /// Exact text to overwrite
    Literal { text: String },
    /// Insert at the start of the module
    Prepend,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyTransformList,
    MissingField {
        transform_id: Option<String>,
        field: &'static str,
    },
    DuplicateId(String),
    UnknownTarget {
        transform_id: Option<String>,
        target: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyTransformList => {
                write!(f, "transform config contains no transforms")
            }
            ValidationIssue::MissingField {
                transform_id,
                field,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' missing required field '{field}'"),
                None => write!(f, "transform missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId(id) => write!(f, "transform id '{id}' is declared twice"),
            ValidationIssue::UnknownTarget {
                transform_id,
                target,
            } => match transform_id {
                Some(id) => write!(f, "transform '{id}' has replacement for unknown target '{target}'"),
                None => write!(f, "transform has replacement for unknown target '{target}'"),
            },
        }
    }
}
