//! Source lines surrounding a failure location.

use std::io::Read;
use std::path::Path;

use tracing::warn;

use super::line_reader::LineStreamReader;
use crate::model::types::CodeLine;

/// Most lines kept before the failing line.
pub const MAX_BEFORE: usize = 9;
/// Lines dropped together when the before-window is full.
pub const BEFORE_TRIM: usize = 4;
/// Most lines kept after the failing line.
pub const MAX_AFTER: usize = 10;

/// Window of code around a failing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    /// The failing line's text.
    pub executed: String,
    /// The failing line's number.
    pub line_number: u32,
    /// Before-lines, the failing line, then after-lines, in file order.
    pub lines: Vec<CodeLine>,
}

impl SourceContext {
    pub fn center(&self) -> Option<&CodeLine> {
        self.lines.iter().find(|l| l.line_number == self.line_number)
    }
}

/// Streams a source file to extract a [`SourceContext`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceContextExtractor;

impl SourceContextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Context around 1-based `line` of the file at `path`.
    ///
    /// `None` if the file can't be opened or has fewer than `line` lines.
    pub fn extract(&self, path: &Path, line: u32) -> Option<SourceContext> {
        let reader = match LineStreamReader::open(path) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "source context: cannot read test source");
                return None;
            }
        };
        let context = self.extract_from(reader, line);
        if context.is_none() {
            warn!(path = %path.display(), line, "source context: failing line not found in file");
        }
        context
    }

    /// Same as [`extract`](Self::extract) over an already-open line stream.
    pub fn extract_from<R: Read>(
        &self,
        lines: LineStreamReader<R>,
        line: u32,
    ) -> Option<SourceContext> {
        if line == 0 {
            return None;
        }

        let mut before: Vec<CodeLine> = Vec::with_capacity(MAX_BEFORE);
        let mut center: Option<CodeLine> = None;
        let mut after: Vec<CodeLine> = Vec::with_capacity(MAX_AFTER);

        for (number, text) in (1u32..).zip(lines) {
            if center.is_none() {
                if number == line {
                    center = Some(CodeLine::new(number, text));
                    continue;
                }
                if before.len() >= MAX_BEFORE {
                    before.drain(..BEFORE_TRIM);
                }
                before.push(CodeLine::new(number, text));
            } else {
                after.push(CodeLine::new(number, text));
                if after.len() >= MAX_AFTER {
                    break;
                }
            }
        }

        let center = center?;
        let executed = center.line_code.clone();
        let line_number = center.line_number;
        let mut window = before;
        window.reserve(1 + after.len());
        window.push(center);
        window.extend(after);

        Some(SourceContext {
            executed,
            line_number,
            lines: window,
        })
    }
}
