use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every rewrite compiles down to a list of these. Spans index the original
/// module text and are applied in memory; the input is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to put at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("before-text verification failed at [{byte_start}, {byte_end}): found {found:?}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in text of length {text_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        text_len: usize,
    },

    #[error("byte range [{byte_start}, {byte_end}) splits a UTF-8 character")]
    NotCharBoundary { byte_start: usize, byte_end: usize },

    #[error(
        "edits must be ascending and non-overlapping: [{prev_start}, {prev_end}) precedes [{next_start}, {next_end})"
    )]
    UnorderedEdits {
        prev_start: usize,
        prev_end: usize,
        next_start: usize,
        next_end: usize,
    },
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl AsRef<str>,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before.as_ref()),
        }
    }

    /// Zero-length insertion at the very start of the text.
    pub fn prepend(new_text: impl Into<String>) -> Self {
        Self::new(0, 0, new_text, "")
    }

    /// Net change in text length this edit causes.
    pub fn len_delta(&self) -> isize {
        self.new_text.len() as isize - (self.byte_end - self.byte_start) as isize
    }

    /// Validate the edit against the text it will be applied to.
    ///
    /// Returns the current text at [byte_start, byte_end) if validation succeeds.
    pub fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                text_len: content.len(),
            });
        }

        if !content.is_char_boundary(self.byte_start) || !content.is_char_boundary(self.byte_end) {
            return Err(EditError::NotCharBoundary {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
            });
        }

        let current_text = &content[self.byte_start..self.byte_end];
        if !self.expected_before.matches(current_text) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current_text.to_string(),
            });
        }

        Ok(current_text)
    }
}

/// Check that edits are sorted by start and do not overlap.
///
/// Two zero-length edits at the same offset are rejected too: their relative
/// order in the output would be ambiguous.
pub fn check_ordering(edits: &[Edit]) -> Result<(), EditError> {
    for window in edits.windows(2) {
        let (prev, next) = (&window[0], &window[1]);
        let overlapping = next.byte_start < prev.byte_end;
        let same_insertion_point = prev.byte_start == next.byte_start;
        if overlapping || same_insertion_point {
            return Err(EditError::UnorderedEdits {
                prev_start: prev.byte_start,
                prev_end: prev.byte_end,
                next_start: next.byte_start,
                next_end: next.byte_end,
            });
        }
    }
    Ok(())
}

/// Apply ascending, non-overlapping edits to `original`, returning the new text.
pub fn apply_edits(original: &str, edits: &[Edit]) -> Result<String, EditError> {
    check_ordering(edits)?;
    for edit in edits {
        edit.validate(original)?;
    }

    let delta: isize = edits.iter().map(Edit::len_delta).sum();
    let capacity = (original.len() as isize + delta).max(0) as usize;
    let mut patched = String::with_capacity(capacity);

    let mut cursor = 0;
    for edit in edits {
        patched.push_str(&original[cursor..edit.byte_start]);
        patched.push_str(&edit.new_text);
        cursor = edit.byte_end;
    }
    patched.push_str(&original[cursor..]);

    Ok(patched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_verification_exact_match() {
        let text = "hello world";
        let verify = EditVerification::ExactMatch(text.to_string());
        assert!(verify.matches(text));
        assert!(!verify.matches("hello"));
    }

    #[test]
    fn test_edit_verification_hash() {
        let text = "hello world";
        let verify = EditVerification::Hash(xxh3_64(text.as_bytes()));
        assert!(verify.matches(text));
        assert!(!verify.matches("goodbye world"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        assert!(matches!(
            EditVerification::from_text(&text),
            EditVerification::Hash(_)
        ));
        assert!(matches!(
            EditVerification::from_text("small"),
            EditVerification::ExactMatch(_)
        ));
    }

    #[test]
    fn test_edit_validation_invalid_range() {
        let edit = Edit::new(5, 20, "replacement", "");
        let result = edit.validate("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_inverted_range() {
        let edit = Edit::new(10, 5, "replacement", "");
        let result = edit.validate("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_validation_char_boundary() {
        let edit = Edit::new(1, 2, "x", "");
        let result = edit.validate("é!");
        assert!(matches!(result, Err(EditError::NotCharBoundary { .. })));
    }

    #[test]
    fn test_edit_validation_before_text_mismatch() {
        let edit = Edit::new(0, 5, "HELLO", "help!");
        let result = edit.validate("hello world");
        assert!(matches!(result, Err(EditError::BeforeTextMismatch { .. })));
    }

    #[test]
    fn test_apply_single_overwrite() {
        let edits = vec![Edit::new(6, 11, "there", "world")];
        assert_eq!(apply_edits("hello world", &edits).unwrap(), "hello there");
    }

    #[test]
    fn test_apply_prepend() {
        let edits = vec![Edit::prepend("// header\n")];
        assert_eq!(apply_edits("body", &edits).unwrap(), "// header\nbody");
    }

    #[test]
    fn test_apply_multiple_edits() {
        let edits = vec![
            Edit::new(0, 5, "LINE1", "line1"),
            Edit::new(6, 11, "L2", "line2"),
            Edit::new(12, 17, "", "line3"),
        ];
        let patched = apply_edits("line1\nline2\nline3\n", &edits).unwrap();
        assert_eq!(patched, "LINE1\nL2\n\n");
    }

    #[test]
    fn test_apply_rejects_overlap() {
        let edits = vec![Edit::new(0, 5, "a", "hello"), Edit::new(3, 7, "b", "lo w")];
        let result = apply_edits("hello world", &edits);
        assert!(matches!(result, Err(EditError::UnorderedEdits { .. })));
    }

    #[test]
    fn test_apply_rejects_descending() {
        let edits = vec![Edit::new(6, 11, "a", "world"), Edit::new(0, 5, "b", "hello")];
        let result = apply_edits("hello world", &edits);
        assert!(matches!(result, Err(EditError::UnorderedEdits { .. })));
    }

    #[test]
    fn test_apply_rejects_duplicate_insertion_point() {
        let edits = vec![Edit::prepend("a"), Edit::prepend("b")];
        let result = apply_edits("text", &edits);
        assert!(matches!(result, Err(EditError::UnorderedEdits { .. })));
    }

    #[test]
    fn test_len_delta() {
        assert_eq!(Edit::new(0, 5, "hi", "hello").len_delta(), -3);
        assert_eq!(Edit::prepend("abc").len_delta(), 3);
    }
}
