//! Line-addressed buffers.
//!
//! The applicator never owns text. It talks to the host through
//! [`BufferProvider`], which addresses lines with 0-based, end-exclusive
//! ranges. [`MemoryBuffers`] is a plain in-process provider used by the CLI
//! and the tests.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BufferError, BufferResult};

/// Opaque identifier for an open buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(u64);

impl BufferId {
    /// Wrap a host-assigned handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host access to mutable line buffers.
pub trait BufferProvider {
    /// Whether `buffer` resolves to a live buffer.
    fn is_valid(&self, buffer: BufferId) -> bool;

    /// Number of lines in `buffer`.
    fn line_count(&self, buffer: BufferId) -> BufferResult<usize>;

    /// Lines in `range` (0-based, end-exclusive).
    fn get_lines(&self, buffer: BufferId, range: Range<usize>) -> BufferResult<Vec<String>>;

    /// Replace the lines in `range` with `lines`. An empty range inserts.
    fn set_lines(
        &mut self,
        buffer: BufferId,
        range: Range<usize>,
        lines: Vec<String>,
    ) -> BufferResult<()>;
}

/// In-memory buffer store.
#[derive(Debug, Default)]
pub struct MemoryBuffers {
    next_id: u64,
    buffers: HashMap<BufferId, Vec<String>>,
}

impl MemoryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a buffer holding `lines`.
    pub fn open<I, S>(&mut self, lines: I) -> BufferId
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next_id += 1;
        let id = BufferId(self.next_id);
        self.buffers
            .insert(id, lines.into_iter().map(Into::into).collect());
        id
    }

    /// Open a buffer from file-style text; a trailing newline ends the last
    /// line rather than starting an empty one.
    pub fn open_text(&mut self, text: &str) -> BufferId {
        self.open(text.lines())
    }

    /// Read a file into a new buffer.
    pub fn open_file(&mut self, path: &Path) -> std::io::Result<BufferId> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.open_text(&content))
    }

    /// Close a buffer. Returns false if it was not open.
    pub fn close(&mut self, buffer: BufferId) -> bool {
        self.buffers.remove(&buffer).is_some()
    }

    /// Borrow a buffer's lines.
    pub fn lines(&self, buffer: BufferId) -> Option<&[String]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Render a buffer as file text.
    pub fn text(&self, buffer: BufferId) -> Option<String> {
        self.lines(buffer).map(render_text)
    }

    fn entry(&self, buffer: BufferId) -> BufferResult<&Vec<String>> {
        self.buffers
            .get(&buffer)
            .ok_or(BufferError::Closed { buffer })
    }
}

impl BufferProvider for MemoryBuffers {
    fn is_valid(&self, buffer: BufferId) -> bool {
        self.buffers.contains_key(&buffer)
    }

    fn line_count(&self, buffer: BufferId) -> BufferResult<usize> {
        Ok(self.entry(buffer)?.len())
    }

    fn get_lines(&self, buffer: BufferId, range: Range<usize>) -> BufferResult<Vec<String>> {
        let lines = self.entry(buffer)?;
        check_range(buffer, &range, lines.len())?;
        Ok(lines[range].to_vec())
    }

    fn set_lines(
        &mut self,
        buffer: BufferId,
        range: Range<usize>,
        new_lines: Vec<String>,
    ) -> BufferResult<()> {
        let lines = self
            .buffers
            .get_mut(&buffer)
            .ok_or(BufferError::Closed { buffer })?;
        check_range(buffer, &range, lines.len())?;
        lines.splice(range, new_lines);
        Ok(())
    }
}

fn check_range(buffer: BufferId, range: &Range<usize>, line_count: usize) -> BufferResult<()> {
    if range.start > range.end || range.end > line_count {
        return Err(BufferError::RangeOutOfBounds {
            buffer,
            start: range.start,
            end: range.end,
            line_count,
        });
    }
    Ok(())
}

/// Line-ending conventions of a file, kept so a save writes them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLayout {
    pub crlf: bool,
    pub trailing_newline: bool,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            crlf: false,
            trailing_newline: true,
        }
    }
}

impl TextLayout {
    /// Detect the layout of `text` from its first line break and its end.
    pub fn detect(text: &str) -> Self {
        let crlf = text
            .find('\n')
            .is_some_and(|i| text[..i].ends_with('\r'));
        Self {
            crlf,
            trailing_newline: text.is_empty() || text.ends_with('\n'),
        }
    }

    pub fn line_ending(&self) -> &'static str {
        if self.crlf { "\r\n" } else { "\n" }
    }

    /// Join lines into file text with this layout's endings.
    pub fn render(&self, lines: &[String]) -> String {
        let ending = self.line_ending();
        let mut content = lines.join(ending);
        if self.trailing_newline && !lines.is_empty() {
            content.push_str(ending);
        }
        content
    }
}

/// Join lines into file text, ending with a newline unless empty.
pub fn render_text(lines: &[String]) -> String {
    TextLayout::default().render(lines)
}

/// Read every line of a buffer.
pub fn read_all(buffers: &dyn BufferProvider, buffer: BufferId) -> BufferResult<Vec<String>> {
    let count = buffers.line_count(buffer)?;
    buffers.get_lines(buffer, 0..count)
}
