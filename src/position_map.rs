//! Position maps from patched text back to the original module text.
//!
//! A [`PositionMap`] is an ordered list of [`Segment`]s covering the patched
//! text end to end. Unchanged segments resolve byte-for-byte; replaced
//! segments resolve every offset to the start of the edit that produced
//! them. Resolution is therefore monotonic non-decreasing over the whole
//! patched text, which is what debugger-facing source maps need.
//!
//! Maps from successive rewrites of the same module are chained with
//! [`PositionMap::compose`], so the final text always resolves straight to
//! the first original.

use crate::edit::{check_ordering, Edit, EditError};
use sourcemap::{SourceMap, SourceMapBuilder};

/// How a run of patched text relates to the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Copied verbatim from the original
    Unchanged,
    /// Introduced by an edit
    Replaced,
}

/// A contiguous run of patched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Offset of the run in the patched text
    pub generated_start: usize,
    /// Length of the run in bytes (never zero)
    pub len: usize,
    /// Where the run starts in the original text
    pub original_start: usize,
    pub kind: SegmentKind,
}

impl Segment {
    fn generated_end(&self) -> usize {
        self.generated_start + self.len
    }

    fn resolve(&self, generated: usize) -> usize {
        match self.kind {
            SegmentKind::Unchanged => self.original_start + (generated - self.generated_start),
            SegmentKind::Replaced => self.original_start,
        }
    }
}

/// Translation table from patched offsets to original offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionMap {
    segments: Vec<Segment>,
    generated_len: usize,
    original_len: usize,
}

impl PositionMap {
    /// Map for text that was not rewritten at all.
    pub fn identity(len: usize) -> Self {
        let segments = if len == 0 {
            Vec::new()
        } else {
            vec![Segment {
                generated_start: 0,
                len,
                original_start: 0,
                kind: SegmentKind::Unchanged,
            }]
        };
        Self {
            segments,
            generated_len: len,
            original_len: len,
        }
    }

    /// Build the map for `edits` applied to `original`.
    ///
    /// Edits must be ascending and non-overlapping; anything else is a bug in
    /// the caller and comes back as [`EditError::UnorderedEdits`].
    pub fn build(original: &str, edits: &[Edit]) -> Result<Self, EditError> {
        check_ordering(edits)?;

        let mut segments = Vec::with_capacity(edits.len() * 2 + 1);
        let mut generated = 0;
        let mut cursor = 0;

        for edit in edits {
            edit.validate(original)?;

            if edit.byte_start > cursor {
                let len = edit.byte_start - cursor;
                segments.push(Segment {
                    generated_start: generated,
                    len,
                    original_start: cursor,
                    kind: SegmentKind::Unchanged,
                });
                generated += len;
            }

            if !edit.new_text.is_empty() {
                segments.push(Segment {
                    generated_start: generated,
                    len: edit.new_text.len(),
                    original_start: edit.byte_start,
                    kind: SegmentKind::Replaced,
                });
                generated += edit.new_text.len();
            }

            cursor = edit.byte_end;
        }

        if original.len() > cursor {
            let len = original.len() - cursor;
            segments.push(Segment {
                generated_start: generated,
                len,
                original_start: cursor,
                kind: SegmentKind::Unchanged,
            });
            generated += len;
        }

        Ok(Self {
            segments,
            generated_len: generated,
            original_len: original.len(),
        })
    }

    /// Resolve an offset in the patched text to an offset in the original.
    ///
    /// Offsets at or past the end of the patched text resolve to the end of
    /// the original.
    pub fn resolve(&self, generated: usize) -> usize {
        if generated >= self.generated_len {
            return self.original_len;
        }
        let idx = self
            .segments
            .partition_point(|segment| segment.generated_start <= generated);
        // segments tile [0, generated_len) so idx >= 1 here
        self.segments[idx - 1].resolve(generated)
    }

    /// Chain two maps: `self` maps B to A, `later` maps C to B; the result
    /// maps C to A.
    pub fn compose(&self, later: &PositionMap) -> PositionMap {
        let mut segments: Vec<Segment> = Vec::with_capacity(later.segments.len());

        for segment in &later.segments {
            match segment.kind {
                SegmentKind::Replaced => push_merged(
                    &mut segments,
                    Segment {
                        original_start: self.resolve(segment.original_start),
                        ..*segment
                    },
                ),
                SegmentKind::Unchanged => {
                    self.split_unchanged(segment, &mut segments);
                }
            }
        }

        PositionMap {
            segments,
            generated_len: later.generated_len,
            original_len: self.original_len,
        }
    }

    /// Re-express an unchanged run of `later` (indexing our generated text)
    /// in terms of our segments.
    fn split_unchanged(&self, run: &Segment, out: &mut Vec<Segment>) {
        let run_start = run.original_start;
        let run_end = run.original_start + run.len;
        let first = self
            .segments
            .partition_point(|segment| segment.generated_end() <= run_start);

        for inner in &self.segments[first..] {
            if inner.generated_start >= run_end {
                break;
            }
            let from = inner.generated_start.max(run_start);
            let to = inner.generated_end().min(run_end);
            push_merged(
                out,
                Segment {
                    generated_start: run.generated_start + (from - run_start),
                    len: to - from,
                    original_start: inner.resolve(from),
                    kind: inner.kind,
                },
            );
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn generated_len(&self) -> usize {
        self.generated_len
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Render a Source Map v3 document for this map.
    ///
    /// `original` and `patched` must be the texts this map was built from.
    /// Unchanged text gets one token per character; replaced text gets one
    /// token at its start and one at the start of each line inside it.
    /// Columns count UTF-16 code units.
    pub fn to_source_map(
        &self,
        file: Option<&str>,
        source_name: &str,
        original: &str,
        patched: &str,
    ) -> SourceMap {
        let mut builder = SourceMapBuilder::new(file);
        let source_id = builder.add_source(source_name);
        builder.set_source_contents(source_id, Some(original));

        let mut generated = TextCursor::default();
        let mut source = TextCursor::default();

        for segment in &self.segments {
            source.advance_to(original, segment.original_start);
            let text = &patched[segment.generated_start..segment.generated_end()];
            let mut line_start = true;

            for ch in text.chars() {
                let mapped = match segment.kind {
                    SegmentKind::Unchanged => ch != '\n',
                    SegmentKind::Replaced => line_start && ch != '\n',
                };
                if mapped {
                    builder.add_raw(
                        generated.line,
                        generated.column,
                        source.line,
                        source.column,
                        Some(source_id),
                        None,
                        false,
                    );
                    line_start = false;
                }

                generated.step(ch);
                match segment.kind {
                    SegmentKind::Unchanged => source.step(ch),
                    SegmentKind::Replaced => line_start |= ch == '\n',
                }
            }

            if segment.kind == SegmentKind::Unchanged {
                source.offset += text.len();
            }
        }

        builder.into_sourcemap()
    }
}

/// Append `segment`, folding it into the previous one when they continue
/// each other.
fn push_merged(segments: &mut Vec<Segment>, segment: Segment) {
    if segment.len == 0 {
        return;
    }
    if let Some(last) = segments.last_mut() {
        let contiguous = last.kind == segment.kind && last.generated_end() == segment.generated_start;
        let continues = match segment.kind {
            SegmentKind::Unchanged => last.original_start + last.len == segment.original_start,
            SegmentKind::Replaced => last.original_start == segment.original_start,
        };
        if contiguous && continues {
            last.len += segment.len;
            return;
        }
    }
    segments.push(segment);
}

/// Line/column position while walking a text forwards.
#[derive(Debug, Default)]
struct TextCursor {
    offset: usize,
    line: u32,
    column: u32,
}

impl TextCursor {
    fn step(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += ch.len_utf16() as u32;
        }
    }

    fn advance_to(&mut self, text: &str, target: usize) {
        if target <= self.offset {
            return;
        }
        for ch in text[self.offset..target].chars() {
            self.step(ch);
        }
        self.offset = target;
    }
}
