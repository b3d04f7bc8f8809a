//! Writing buffers back to disk after a successful batch.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::buffer::{BufferId, BufferProvider, MemoryBuffers, TextLayout, read_all};
use crate::error::PersistError;

/// Persistence collaborator invoked after a fully successful batch in
/// [`crate::SaveMode::Auto`].
pub trait Persistence {
    fn save(&mut self, buffers: &dyn BufferProvider, buffer: BufferId) -> Result<(), PersistError>;
}

/// A file a buffer was opened from.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TrackedFile {
    path: PathBuf,
    layout: TextLayout,
}

/// Saves buffers to the files they were opened from, keeping each file's
/// line endings.
#[derive(Debug, Clone, Default)]
pub struct FilePersistence {
    files: HashMap<BufferId, TrackedFile>,
}

impl FilePersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `path` into a new buffer and track it with the file's layout.
    pub fn open_file(
        &mut self,
        buffers: &mut MemoryBuffers,
        path: impl Into<PathBuf>,
    ) -> std::io::Result<BufferId> {
        let path = path.into();
        let content = fs::read_to_string(&path)?;
        let layout = TextLayout::detect(&content);
        let id = buffers.open_text(&content);
        self.track_with_layout(id, path, layout);
        Ok(id)
    }

    /// Associate `buffer` with `path`, written with LF endings.
    pub fn track(&mut self, buffer: BufferId, path: impl Into<PathBuf>) {
        self.track_with_layout(buffer, path, TextLayout::default());
    }

    pub fn track_with_layout(
        &mut self,
        buffer: BufferId,
        path: impl Into<PathBuf>,
        layout: TextLayout,
    ) {
        self.files.insert(
            buffer,
            TrackedFile {
                path: path.into(),
                layout,
            },
        );
    }

    pub fn with_path(mut self, buffer: BufferId, path: impl Into<PathBuf>) -> Self {
        self.track(buffer, path);
        self
    }

    pub fn path_for(&self, buffer: BufferId) -> Option<&Path> {
        self.files.get(&buffer).map(|f| f.path.as_path())
    }

    pub fn layout_for(&self, buffer: BufferId) -> Option<TextLayout> {
        self.files.get(&buffer).map(|f| f.layout)
    }
}

impl Persistence for FilePersistence {
    fn save(&mut self, buffers: &dyn BufferProvider, buffer: BufferId) -> Result<(), PersistError> {
        let file = self
            .files
            .get(&buffer)
            .ok_or(PersistError::NoPath(buffer))?;
        let content = file.layout.render(&read_all(buffers, buffer)?);

        atomic_write_file(&file.path, &content).map_err(|e| PersistError::WriteError {
            path: file.path.clone(),
            source: e,
        })?;
        debug!("Saved buffer {} to {}", buffer, file.path.display());
        Ok(())
    }
}

/// Write via a temp file in the same directory, then rename over the target.
pub(crate) fn atomic_write_file(path: &Path, content: &str) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut temp_file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        temp_file.write_all(content.as_bytes())?;
        temp_file.sync_all()?;
    }

    #[cfg(windows)]
    if path.exists() {
        fs::remove_file(path).inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })?;
    }

    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}
