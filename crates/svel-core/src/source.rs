//! Source buffer management and include-path resolution.
//!
//! The [`SourceMap`] owns every buffer handed to the front-end, inline ones
//! as well as the files pulled in by `` `include ``. Spans index into these
//! buffers by byte offset and stay valid for the life of the compilation.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Unique identifier for a source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceId(pub u32);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

/// A source buffer with its content and origin.
#[derive(Debug, Clone)]
pub struct Source {
    pub id: SourceId,
    /// Path the buffer was loaded from, `None` for inline sources.
    pub path: Option<PathBuf>,
    pub content: String,
}

impl Source {
    /// Display name used in diagnostics.
    pub fn name(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<source#{}>", self.id.0))
    }

    /// Directory containing this buffer's file, if it came from one.
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_ref().and_then(|p| p.parent())
    }

    /// Line and column (1-based) for a byte offset.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;
        for (i, ch) in self.content.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}

/// Manages every source buffer in a compilation and resolves `` `include ``
/// file names against the configured search directories.
#[derive(Debug, Default)]
pub struct SourceMap {
    sources: Vec<Source>,
    path_to_id: HashMap<PathBuf, SourceId>,
    include_dirs: Vec<PathBuf>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directory to the include search list. Directories are
    /// searched in the order they were added.
    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.include_dirs.push(dir.into());
    }

    /// Add a source buffer loaded from a path. Re-adding the same path
    /// returns the existing id.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> SourceId {
        let path = path.into();
        if let Some(&id) = self.path_to_id.get(&path) {
            return id;
        }

        let id = SourceId(self.sources.len() as u32);
        self.path_to_id.insert(path.clone(), id);
        self.sources.push(Source { id, path: Some(path), content: content.into() });
        id
    }

    /// Add an inline source buffer with no backing file.
    pub fn add_inline(&mut self, content: impl Into<String>) -> SourceId {
        let id = SourceId(self.sources.len() as u32);
        self.sources.push(Source { id, path: None, content: content.into() });
        id
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.get(id.0 as usize)
    }

    /// Resolve an include file name. Quoted includes (`"name"`) search the
    /// including file's own directory before the configured list; bracketed
    /// includes (`<name>`) search only the configured list. Returns the
    /// loaded buffer's id, or `None` if no candidate exists on disk.
    pub fn resolve_include(
        &mut self,
        name: &str,
        quoted: bool,
        from: SourceId,
    ) -> Option<SourceId> {
        let mut candidates = Vec::new();
        if quoted {
            if let Some(dir) = self.get(from).and_then(Source::directory) {
                candidates.push(dir.join(name));
            }
        }
        for dir in &self.include_dirs {
            candidates.push(dir.join(name));
        }

        for path in candidates {
            if let Some(&id) = self.path_to_id.get(&path) {
                return Some(id);
            }
            if let Ok(content) = std::fs::read_to_string(&path) {
                return Some(self.add_file(path, content));
            }
        }
        None
    }
}

/// A byte range within one source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: SourceId, start: usize, end: usize) -> Self {
        Self { source, start, end }
    }

    /// A zero-length span at a position.
    pub fn point(source: SourceId, offset: usize) -> Self {
        Self::new(source, offset, offset)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both inputs. Both must be in the same buffer.
    pub fn merge(self, other: Self) -> Self {
        debug_assert_eq!(self.source, other.source);
        Self {
            source: self.source,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self { source: SourceId(0), start: 0, end: 0 }
    }
}
