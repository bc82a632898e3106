//! # Source Archive Extraction
//!
//! The registry client only ever *stores* verified archive bytes. Unpacking
//! is a separate step performed by an [`Archiver`] when the caller asks for
//! it, always on bytes that already passed checksum verification.
//!
//! [`ZipArchiver`] rejects entries whose names would resolve outside the
//! destination (absolute paths, `..` components).

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ArchiveError;
use crate::fs::FileSystem;

/// Extracts an archive stored in a [`FileSystem`] into a directory of the
/// same file system.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Extract `archive_path` into `destination`, creating it if needed.
    async fn extract(
        &self,
        fs: &dyn FileSystem,
        archive_path: &Path,
        destination: &Path,
    ) -> Result<(), ArchiveError>;
}

/// Archiver for zip source archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

enum Entry {
    Directory(PathBuf),
    File(PathBuf, Vec<u8>),
}

impl ZipArchiver {
    /// Decode every entry up front so no zip reader is held across the
    /// asynchronous writes.
    fn read_entries(bytes: &[u8]) -> Result<Vec<Entry>, ArchiveError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let relative = file
                .enclosed_name()
                .map(PathBuf::from)
                .ok_or_else(|| ArchiveError::UnsafeEntry(file.name().to_string()))?;

            if file.is_dir() {
                entries.push(Entry::Directory(relative));
            } else {
                let mut contents = Vec::new();
                file.read_to_end(&mut contents)?;
                entries.push(Entry::File(relative, contents));
            }
        }

        Ok(entries)
    }
}

#[async_trait]
impl Archiver for ZipArchiver {
    async fn extract(
        &self,
        fs: &dyn FileSystem,
        archive_path: &Path,
        destination: &Path,
    ) -> Result<(), ArchiveError> {
        let bytes = fs.read_file(archive_path).await?;
        let entries = Self::read_entries(&bytes)?;

        fs.create_dir_all(destination).await?;
        for entry in &entries {
            match entry {
                Entry::Directory(relative) => {
                    fs.create_dir_all(&destination.join(relative)).await?;
                }
                Entry::File(relative, contents) => {
                    let target = destination.join(relative);
                    if let Some(parent) = target.parent() {
                        fs.create_dir_all(parent).await?;
                    }
                    fs.write_file(&target, contents).await?;
                }
            }
        }

        tracing::debug!(
            archive = %archive_path.display(),
            destination = %destination.display(),
            entries = entries.len(),
            "extracted source archive"
        );
        Ok(())
    }
}
