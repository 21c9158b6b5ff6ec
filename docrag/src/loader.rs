//! Document sources for ingestion.

use std::path::{Path, PathBuf};

use tracing::{debug, error};
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// Anything that can enumerate raw documents for ingestion.
pub trait DocumentSource: Send + Sync {
    /// Load all documents from the source.
    fn load(&self) -> Result<Vec<Document>>;
}

impl DocumentSource for Vec<Document> {
    fn load(&self) -> Result<Vec<Document>> {
        Ok(self.clone())
    }
}

/// Loads UTF-8 text files from a directory tree.
///
/// Files are returned sorted by path. A document's ID is its path relative to
/// the root (with `/` separators), its `source_uri` is the full path, and its
/// metadata carries `file_name` and `extension`.
///
/// Symbolic links are followed. Any traversal failure, such as an unreadable
/// directory or a link cycle, fails the load.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::{DirectoryLoader, DocumentSource};
///
/// let documents = DirectoryLoader::new("docs").with_extensions(["md"]).load()?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    extensions: Vec<String>,
}

impl DirectoryLoader {
    /// Create a loader for `.txt` and `.md` files under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extensions: vec!["txt".to_string(), "md".to_string()] }
    }

    /// Replace the accepted file extensions (without the leading dot).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|wanted| wanted == ext))
    }
}

impl DocumentSource for DirectoryLoader {
    fn load(&self) -> Result<Vec<Document>> {
        if !self.root.is_dir() {
            return Err(RagError::ConfigError(format!(
                "document root '{}' is not a directory",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = entry.map_err(walk_error)?;
            if entry.file_type().is_file() && self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let text = std::fs::read_to_string(&path)?;
            let relative = path.strip_prefix(&self.root).unwrap_or(path.as_path());
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let mut document = Document::new(id, text).with_source_uri(path.display().to_string());
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                document = document.with_metadata("file_name", name);
            }
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                document = document.with_metadata("extension", ext);
            }
            documents.push(document);
        }

        debug!(root = %self.root.display(), documents = documents.len(), "loaded documents");
        Ok(documents)
    }
}

/// Map a traversal failure to its I/O error when it has one.
fn walk_error(err: walkdir::Error) -> RagError {
    let path = err.path().map(|p| p.display().to_string()).unwrap_or_default();
    let message = err.to_string();
    error!(path = %path, error = %message, "failed to walk document directory");
    match err.into_io_error() {
        Some(io) => RagError::Io(io),
        None => RagError::ConfigError(format!("cannot walk '{path}': {message}")),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn loads_matching_files_sorted() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.txt"), "bravo").unwrap();
        fs::write(root.join("a.md"), "# alpha").unwrap();
        fs::write(root.join("nested/c.txt"), "charlie").unwrap();
        fs::write(root.join("ignored.bin"), [0u8, 159, 146, 150]).unwrap();

        let documents = DirectoryLoader::new(root).load().unwrap();
        let ids: Vec<_> = documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.txt", "nested/c.txt"]);
        assert_eq!(documents[2].text, "charlie");
        assert_eq!(documents[1].metadata.get("extension").map(String::as_str), Some("txt"));
        assert!(documents[0].source_uri.as_deref().is_some_and(|uri| uri.ends_with("a.md")));
    }

    #[test]
    fn extension_filter_is_configurable() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "alpha").unwrap();
        fs::write(temp.path().join("b.txt"), "bravo").unwrap();

        let documents = DirectoryLoader::new(temp.path()).with_extensions(["md"]).load().unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].id, "a.md");
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = DirectoryLoader::new(temp.path().join("absent")).load().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn invalid_utf8_fails_the_load() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("bad.txt"), [0xffu8, 0xfe]).unwrap();
        assert!(matches!(DirectoryLoader::new(temp.path()).load(), Err(RagError::Io(_))));
    }

    #[cfg(unix)]
    #[test]
    fn traversal_errors_fail_the_load() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "alpha").unwrap();
        fs::create_dir(temp.path().join("nested")).unwrap();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("nested/loop")).unwrap();

        let err = DirectoryLoader::new(temp.path()).load().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(ref msg) if msg.contains("loop")));
    }
}
