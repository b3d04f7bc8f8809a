//! Literal search and replace of the first occurrence.
//!
//! Whole-content and single-shot: there is nothing to correct afterwards, so
//! no ledger is involved.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::buffer::{BufferId, BufferProvider, read_all};
use crate::error::SearchReplaceError;
use crate::operation::split_lines;
use crate::persist::atomic_write_file;

/// Result type for search/replace edits.
pub type ReplaceResult<T> = Result<T, SearchReplaceError>;

/// Per-path locks so two edits of the same file in this process never
/// interleave their read and write.
static FILE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Lock for `path`, keyed by its canonical form so aliases share one lock.
fn file_lock(path: &Path) -> Arc<AsyncMutex<()>> {
    let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut locks = FILE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    locks
        .entry(key)
        .or_insert_with(|| Arc::new(AsyncMutex::new(())))
        .clone()
}

/// Content after a successful replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub content: String,
    /// Byte offset of the match in the original content.
    pub offset: usize,
    /// 1-based line the match starts on.
    pub line: usize,
}

/// Replace the first literal occurrence of `search`.
///
/// Returns `None` when `search` is empty or absent.
pub fn replace_first(content: &str, search: &str, replacement: &str) -> Option<Replacement> {
    if search.is_empty() {
        return None;
    }
    let offset = content.find(search)?;

    let mut replaced = String::with_capacity(content.len() - search.len() + replacement.len());
    replaced.push_str(&content[..offset]);
    replaced.push_str(replacement);
    replaced.push_str(&content[offset + search.len()..]);

    Some(Replacement {
        content: replaced,
        offset,
        line: content[..offset].matches('\n').count() + 1,
    })
}

/// What a search/replace did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplaceOutcome {
    /// The first occurrence, starting on `line`, was replaced.
    Replaced { line: usize },
    /// The search text does not occur; nothing changed.
    NotFound,
}

impl ReplaceOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Self::Replaced { .. })
    }
}

/// Search/replace engine.
#[derive(Debug, Clone, Default)]
pub struct SearchReplace {
    dry_run: bool,
}

impl SearchReplace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report what would change without writing.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Replace the first occurrence of `search` in the file at `path`.
    pub async fn replace_in_file(
        &self,
        path: &Path,
        search: &str,
        replacement: &str,
    ) -> ReplaceResult<ReplaceOutcome> {
        let lock = file_lock(path);
        let _guard = lock.lock().await;

        if !path.exists() {
            return Err(SearchReplaceError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            fs::read_to_string(path)
                .await
                .map_err(|e| SearchReplaceError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })?;

        let Some(replaced) = replace_first(&content, search, replacement) else {
            warn!("Search text not found in {}", path.display());
            return Ok(ReplaceOutcome::NotFound);
        };

        if !self.dry_run {
            write_file(path, replaced.content)
                .await
                .map_err(|e| SearchReplaceError::WriteError {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            debug!("Replaced text at line {} of {}", replaced.line, path.display());
        }

        Ok(ReplaceOutcome::Replaced {
            line: replaced.line,
        })
    }

    /// Replace the first occurrence of `search` in an open buffer.
    ///
    /// Matches may span lines; the buffer is rewritten as a whole.
    pub fn replace_in_buffer(
        &self,
        buffers: &mut dyn BufferProvider,
        buffer: BufferId,
        search: &str,
        replacement: &str,
    ) -> ReplaceResult<ReplaceOutcome> {
        let lines = read_all(&*buffers, buffer)?;
        let Some(replaced) = replace_first(&lines.join("\n"), search, replacement) else {
            warn!("Search text not found in buffer {}", buffer);
            return Ok(ReplaceOutcome::NotFound);
        };

        if !self.dry_run {
            buffers.set_lines(buffer, 0..lines.len(), split_lines(&replaced.content))?;
            debug!("Replaced text at line {} of buffer {}", replaced.line, buffer);
        }

        Ok(ReplaceOutcome::Replaced {
            line: replaced.line,
        })
    }
}

/// Run the atomic file write off the async runtime.
async fn write_file(path: &Path, content: String) -> std::io::Result<()> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic_write_file(&target, &content))
        .await
        .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MemoryBuffers;
    use tempfile::tempdir;

    #[test]
    fn test_replace_first_only() {
        let replaced = replace_first("foo bar foo", "foo", "baz").unwrap();
        assert_eq!(replaced.content, "baz bar foo");
        assert_eq!(replaced.offset, 0);
        assert_eq!(replaced.line, 1);
    }

    #[test]
    fn test_replace_is_literal() {
        let replaced = replace_first("a.*b\n(x|y) $1", "(x|y)", "$0").unwrap();
        assert_eq!(replaced.content, "a.*b\n$0 $1");
        assert_eq!(replaced.line, 2);
    }

    #[test]
    fn test_replace_first_absent_or_empty() {
        assert!(replace_first("hello", "world", "x").is_none());
        assert!(replace_first("hello", "", "x").is_none());
    }

    #[tokio::test]
    async fn test_replace_in_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.txt");
        fs::write(&file, "one\ntwo\ntwo\n").await.unwrap();

        let outcome = SearchReplace::new()
            .replace_in_file(&file, "two", "2")
            .await
            .unwrap();

        assert_eq!(outcome, ReplaceOutcome::Replaced { line: 2 });
        assert_eq!(fs::read_to_string(&file).await.unwrap(), "one\n2\ntwo\n");
    }

    #[tokio::test]
    async fn test_not_found_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.txt");
        fs::write(&file, "keep\r\nme").await.unwrap();

        let outcome = SearchReplace::new()
            .replace_in_file(&file, "missing", "x")
            .await
            .unwrap();

        assert_eq!(outcome, ReplaceOutcome::NotFound);
        assert_eq!(fs::read(&file).await.unwrap(), b"keep\r\nme");
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("test.txt");
        fs::write(&file, "foo").await.unwrap();

        let outcome = SearchReplace::new()
            .dry_run(true)
            .replace_in_file(&file, "foo", "bar")
            .await
            .unwrap();

        assert!(outcome.is_replaced());
        assert_eq!(fs::read_to_string(&file).await.unwrap(), "foo");
    }

    #[test]
    fn test_file_lock_is_shared_by_path_aliases() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        let alias = dir.path().join(".").join("a.txt");
        assert!(Arc::ptr_eq(&file_lock(&file), &file_lock(&alias)));
    }

    #[tokio::test]
    async fn test_concurrent_edits_through_aliases_both_land() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "one two\n").await.unwrap();
        let alias = dir.path().join(".").join("a.txt");

        let engine = SearchReplace::new();
        let (first, second) = tokio::join!(
            engine.replace_in_file(&file, "one", "1"),
            engine.replace_in_file(&alias, "two", "2"),
        );

        assert!(first.unwrap().is_replaced());
        assert!(second.unwrap().is_replaced());
        assert_eq!(fs::read_to_string(&file).await.unwrap(), "1 2\n");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = SearchReplace::new()
            .replace_in_file(&dir.path().join("nope.txt"), "a", "b")
            .await
            .unwrap_err();

        assert!(matches!(err, SearchReplaceError::FileNotFound { .. }));
    }

    #[test]
    fn test_replace_in_buffer_across_lines() {
        let mut buffers = MemoryBuffers::new();
        let id = buffers.open(["fn main() {", "    old();", "}"]);

        let outcome = SearchReplace::new()
            .replace_in_buffer(&mut buffers, id, "old();\n}", "new();\n    done();\n}")
            .unwrap();

        assert_eq!(outcome, ReplaceOutcome::Replaced { line: 2 });
        assert_eq!(
            buffers.lines(id).unwrap(),
            ["fn main() {", "    new();", "    done();", "}"]
        );
    }

    #[test]
    fn test_replace_in_closed_buffer() {
        let mut buffers = MemoryBuffers::new();
        let id = buffers.open(["x"]);
        buffers.close(id);

        let err = SearchReplace::new()
            .replace_in_buffer(&mut buffers, id, "x", "y")
            .unwrap_err();
        assert!(matches!(err, SearchReplaceError::Buffer(_)));
    }
}
