//! Archive extraction (C7 part 1): the `ExtractionManager`.
//!
//! New relative to the teacher (no teacher module unzips archives); grounded
//! on `zip` crate usage in the wider example pack and `sha2`, already a
//! teacher dependency, repurposed here as the extracted-directory digest for
//! skip-if-unchanged comparisons.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("io error extracting {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid archive {0}: {1}")]
    InvalidArchive(PathBuf, String),
}

#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    /// Path inside the archive, e.g. `com/x/Y.class`.
    pub entry_path: String,
    /// Absolute path on disk under `.analysis/binaries/<archive-name>/…`.
    pub extracted_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub succeeded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Extensions treated as archives subject to physical extraction
/// (spec.md §4.6).
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "war", "ear", "zip"];

pub fn is_archive_extension(extension: &str) -> bool {
    ARCHIVE_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Owns `<project>/.analysis/binaries` exclusively; concurrent analyses over
/// the same project path are unsupported (spec.md §5).
pub struct ExtractionManager {
    binaries_root: PathBuf,
}

impl ExtractionManager {
    pub fn new(project_root: &Path) -> Self {
        Self {
            binaries_root: project_root.join(".analysis").join("binaries"),
        }
    }

    pub fn binaries_root(&self) -> &Path {
        &self.binaries_root
    }

    fn extraction_dir_for(&self, archive_path: &Path) -> PathBuf {
        let stem = archive_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("archive");
        self.binaries_root.join(stem)
    }

    /// Extracts `archive_path`, skipping extraction if the destination
    /// directory's digest marker already matches the archive's current
    /// digest. Deletes a stale extraction directory before re-extracting.
    pub fn extract(
        &self,
        archive_path: &Path,
        report: &mut ExtractionReport,
    ) -> Result<Vec<ExtractedEntry>, ArchiveError> {
        let digest = digest_file(archive_path)?;
        let dest_dir = self.extraction_dir_for(archive_path);
        let marker_path = dest_dir.join(".digest");

        if let Ok(existing) = std::fs::read_to_string(&marker_path) {
            if existing.trim() == digest {
                report.skipped.push(archive_path.to_path_buf());
                return Ok(self.list_extracted(&dest_dir, &digest)?);
            }
            // Stale: remove before re-extracting.
            std::fs::remove_dir_all(&dest_dir).map_err(|e| ArchiveError::Io {
                path: dest_dir.clone(),
                source: e,
            })?;
        }

        match self.extract_into(archive_path, &dest_dir) {
            Ok(entries) => {
                std::fs::create_dir_all(&dest_dir).map_err(|e| ArchiveError::Io {
                    path: dest_dir.clone(),
                    source: e,
                })?;
                let mut marker = File::create(&marker_path).map_err(|e| ArchiveError::Io {
                    path: marker_path.clone(),
                    source: e,
                })?;
                marker.write_all(digest.as_bytes()).map_err(|e| ArchiveError::Io {
                    path: marker_path,
                    source: e,
                })?;
                report.succeeded.push(archive_path.to_path_buf());
                Ok(entries)
            }
            Err(e) => {
                report.failed.push((archive_path.to_path_buf(), e.to_string()));
                Err(e)
            }
        }
    }

    fn extract_into(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<Vec<ExtractedEntry>, ArchiveError> {
        let file = File::open(archive_path).map_err(|e| ArchiveError::Io {
            path: archive_path.to_path_buf(),
            source: e,
        })?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| ArchiveError::InvalidArchive(archive_path.to_path_buf(), e.to_string()))?;

        std::fs::create_dir_all(dest_dir).map_err(|e| ArchiveError::Io {
            path: dest_dir.to_path_buf(),
            source: e,
        })?;

        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| ArchiveError::InvalidArchive(archive_path.to_path_buf(), e.to_string()))?;
            let Some(entry_path) = entry.enclosed_name() else {
                continue; // reject path-traversal entries
            };
            if entry.is_dir() {
                continue;
            }
            let out_path = dest_dir.join(&entry_path);
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ArchiveError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
            let mut out_file = File::create(&out_path).map_err(|e| ArchiveError::Io {
                path: out_path.clone(),
                source: e,
            })?;
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf).map_err(|e| ArchiveError::Io {
                path: out_path.clone(),
                source: e,
            })?;
            out_file.write_all(&buf).map_err(|e| ArchiveError::Io {
                path: out_path.clone(),
                source: e,
            })?;
            entries.push(ExtractedEntry {
                entry_path: entry_path.to_string_lossy().replace('\\', "/"),
                extracted_path: out_path,
            });
        }
        Ok(entries)
    }

    /// Re-list an already-extracted directory without re-extracting
    /// (used on the skip path so phase 1c's rescan still sees entries).
    fn list_extracted(
        &self,
        dest_dir: &Path,
        _digest: &str,
    ) -> Result<Vec<ExtractedEntry>, ArchiveError> {
        let mut entries = Vec::new();
        if !dest_dir.exists() {
            return Ok(entries);
        }
        for walk_entry in walkdir_flat(dest_dir) {
            let path = walk_entry.map_err(|e| ArchiveError::Io {
                path: dest_dir.to_path_buf(),
                source: e,
            })?;
            if path.file_name().and_then(|n| n.to_str()) == Some(".digest") {
                continue;
            }
            if path.is_file() {
                let relative = path
                    .strip_prefix(dest_dir)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .replace('\\', "/");
                entries.push(ExtractedEntry {
                    entry_path: relative,
                    extracted_path: path,
                });
            }
        }
        Ok(entries)
    }
}

/// A dependency-free recursive listing, since `discovery::walker`'s
/// `ignore::WalkBuilder` use is reserved for the project-tree scan, not for
/// re-listing our own extraction output.
fn walkdir_flat(root: &Path) -> Vec<std::io::Result<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let read_dir = match std::fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) => {
                out.push(Err(e));
                continue;
            }
        };
        for entry in read_dir {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                    } else {
                        out.push(Ok(path));
                    }
                }
                Err(e) => out.push(Err(e)),
            }
        }
    }
    out
}

fn digest_file(path: &Path) -> Result<String, ArchiveError> {
    let mut file = File::open(path).map_err(|e| ArchiveError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(|e| ArchiveError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
