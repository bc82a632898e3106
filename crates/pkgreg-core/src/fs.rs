//! # File System Abstraction
//!
//! Verified archive bytes are written through [`FileSystem`] rather than
//! straight to disk, so callers decide where artifacts land and tests can
//! inspect an [`InMemoryFileSystem`] without touching the host.
//!
//! Paths are treated as given. The in-memory implementation expects
//! absolute paths and models `/` as an always-present root directory.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Destination storage for downloaded and extracted artifacts.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read the full contents of a file.
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or replace a file. The parent directory must exist.
    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Create a directory and all missing ancestors.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Whether anything exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Whether `path` is a directory.
    async fn is_dir(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Directory,
}

/// A file system held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

impl InMemoryFileSystem {
    /// Create an empty file system containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// All file paths currently stored, in sorted order.
    pub fn files(&self) -> Vec<PathBuf> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn is_root(path: &Path) -> bool {
        path.parent().is_none()
    }

    fn directory_exists(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> bool {
        Self::is_root(path) || matches!(nodes.get(path), Some(Node::Directory))
    }
}

#[async_trait]
impl FileSystem for InMemoryFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.nodes.read().get(path) {
            Some(Node::File(contents)) => Ok(contents.clone()),
            Some(Node::Directory) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )),
        }
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut nodes = self.nodes.write();

        let parent = path.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "cannot write to the root")
        })?;
        if !Self::directory_exists(&nodes, parent) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent.display()),
            ));
        }
        if matches!(nodes.get(path), Some(Node::Directory)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }

        nodes.insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.write();

        for ancestor in path.ancestors().filter(|p| !Self::is_root(p)) {
            if let Some(Node::File(_)) = nodes.get(ancestor) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
        }
        for ancestor in path.ancestors().filter(|p| !Self::is_root(p)) {
            nodes.insert(ancestor.to_path_buf(), Node::Directory);
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        Self::is_root(path) || self.nodes.read().contains_key(path)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        Self::directory_exists(&self.nodes.read(), path)
    }
}

/// The host file system, accessed through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_write_then_read() {
        let fs = InMemoryFileSystem::new();
        let path = Path::new("/LinkedList-1.1.1");
        fs.write_file(path, b"contents").await.unwrap();
        assert!(fs.exists(path).await);
        assert!(!fs.is_dir(path).await);
        assert_eq!(fs.read_file(path).await.unwrap(), b"contents");
    }

    #[tokio::test]
    async fn in_memory_requires_parent_directory() {
        let fs = InMemoryFileSystem::new();
        let err = fs
            .write_file(Path::new("/missing/file"), b"x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        fs.create_dir_all(Path::new("/missing")).await.unwrap();
        fs.write_file(Path::new("/missing/file"), b"x")
            .await
            .unwrap();
        assert_eq!(fs.files(), vec![PathBuf::from("/missing/file")]);
    }

    #[tokio::test]
    async fn in_memory_create_dir_all_creates_ancestors() {
        let fs = InMemoryFileSystem::new();
        fs.create_dir_all(Path::new("/a/b/c")).await.unwrap();
        assert!(fs.is_dir(Path::new("/a")).await);
        assert!(fs.is_dir(Path::new("/a/b")).await);
        assert!(fs.is_dir(Path::new("/a/b/c")).await);
        assert!(fs.is_dir(Path::new("/")).await);
    }

    #[tokio::test]
    async fn in_memory_rejects_directory_over_file() {
        let fs = InMemoryFileSystem::new();
        fs.write_file(Path::new("/file"), b"x").await.unwrap();
        assert!(fs.create_dir_all(Path::new("/file/sub")).await.is_err());
    }

    #[tokio::test]
    async fn in_memory_missing_file_is_not_found() {
        let fs = InMemoryFileSystem::new();
        let err = fs.read_file(Path::new("/nope")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!fs.exists(Path::new("/nope")).await);
    }

    #[tokio::test]
    async fn local_file_system_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem;
        let nested = dir.path().join("nested");
        fs.create_dir_all(&nested).await.unwrap();
        let file = nested.join("archive.zip");
        fs.write_file(&file, b"zip bytes").await.unwrap();
        assert!(fs.exists(&file).await);
        assert!(fs.is_dir(&nested).await);
        assert_eq!(fs.read_file(&file).await.unwrap(), b"zip bytes");
    }
}
