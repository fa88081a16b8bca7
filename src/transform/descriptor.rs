use crate::target::TargetEnvironment;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over module ids.
///
/// Ids are compared with `\` normalized to `/` so the same descriptor works
/// for paths produced on any host.
#[derive(Clone)]
pub enum ModuleMatcher {
    /// Whole id must be equal
    Exact(String),
    /// Id must end with this path, on a `/` boundary
    Suffix(String),
    /// Id must contain this substring
    Contains(String),
    /// Arbitrary predicate for programmatic registration
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ModuleMatcher {
    pub fn custom(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        ModuleMatcher::Custom(Arc::new(predicate))
    }

    pub fn matches(&self, module_id: &str) -> bool {
        let id = normalize_id(module_id);
        match self {
            ModuleMatcher::Exact(expected) => id == normalize_id(expected),
            ModuleMatcher::Suffix(suffix) => {
                let suffix = normalize_id(suffix);
                let suffix = suffix.trim_start_matches('/');
                match id.strip_suffix(suffix) {
                    Some(rest) => rest.is_empty() || rest.ends_with('/'),
                    None => false,
                }
            }
            ModuleMatcher::Contains(needle) => id.contains(normalize_id(needle).as_str()),
            ModuleMatcher::Custom(predicate) => predicate(&id),
        }
    }
}

fn normalize_id(id: &str) -> String {
    id.replace('\\', "/")
}

impl fmt::Debug for ModuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleMatcher::Exact(id) => f.debug_tuple("Exact").field(id).finish(),
            ModuleMatcher::Suffix(suffix) => f.debug_tuple("Suffix").field(suffix).finish(),
            ModuleMatcher::Contains(needle) => f.debug_tuple("Contains").field(needle).finish(),
            ModuleMatcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl fmt::Display for ModuleMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleMatcher::Exact(id) => write!(f, "id == {id:?}"),
            ModuleMatcher::Suffix(suffix) => write!(f, "id ends with {suffix:?}"),
            ModuleMatcher::Contains(needle) => write!(f, "id contains {needle:?}"),
            ModuleMatcher::Custom(_) => f.write_str("custom predicate"),
        }
    }
}

/// Where a descriptor's edit goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// Exact text that must be present; its first occurrence is overwritten.
    Literal(String),
    /// Zero-length anchor at offset 0.
    Prepend,
}

impl Anchor {
    /// Span of the anchor in `text`, if present.
    pub fn locate(&self, text: &str) -> Option<(usize, usize)> {
        match self {
            Anchor::Literal(literal) => text
                .find(literal.as_str())
                .map(|start| (start, start + literal.len())),
            Anchor::Prepend => Some((0, 0)),
        }
    }

    /// Text expected at the located span.
    pub fn expected_text(&self) -> &str {
        match self {
            Anchor::Literal(literal) => literal,
            Anchor::Prepend => "",
        }
    }
}

/// Declarative rewrite: which modules, what to find, what to put there.
#[derive(Debug, Clone)]
pub struct TransformDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub applies_to: ModuleMatcher,
    pub anchor: Anchor,
    pub replacements: BTreeMap<TargetEnvironment, String>,
}

impl TransformDescriptor {
    pub fn new(name: impl Into<String>, applies_to: ModuleMatcher, anchor: Anchor) -> Self {
        Self {
            name: name.into(),
            description: None,
            applies_to,
            anchor,
            replacements: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_replacement(mut self, target: TargetEnvironment, text: impl Into<String>) -> Self {
        self.replacements.insert(target, text.into());
        self
    }

    pub fn applies_to(&self, module_id: &str) -> bool {
        self.applies_to.matches(module_id)
    }

    pub fn replacement_for(&self, target: TargetEnvironment) -> Option<&str> {
        self.replacements.get(&target).map(String::as_str)
    }

    /// Targets this descriptor has replacements for, in declaration order of
    /// [`TargetEnvironment`].
    pub fn targets(&self) -> impl Iterator<Item = TargetEnvironment> + '_ {
        self.replacements.keys().copied()
    }
}
