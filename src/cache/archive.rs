//! Archive packaging for copy steps
//!
//! Serializes a host file or directory into a tar archive whose entry names
//! are remapped under a target path inside the container. The same pass
//! computes the content digest used for the copy step's cache key.
//!
//! Packaging guarantees:
//! - Entries sorted lexicographically by relative path
//! - Directory, regular-file and symlink entries keep their tar type flags
//! - Ownership set to 0:0, permissions and mtime preserved from the source
//! - Any unreadable path aborts the whole archive

use crate::cache::digest::{digest_file, ContentHasher};
use crate::error::{BoxerError, BoxerResult};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A finished archive and the digest of what it transfers
#[derive(Debug, Clone)]
pub struct PackedArchive {
    /// Tar bytes ready to be extracted at `/` inside the container
    pub data: Vec<u8>,
    /// Hex digest over entry kinds, remapped names and file content digests
    pub digest: String,
    /// Number of entries written
    pub entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Directory,
    Regular,
    Symlink,
}

impl EntryKind {
    fn tag(self) -> u8 {
        match self {
            Self::Directory => b'd',
            Self::Regular => b'f',
            Self::Symlink => b'l',
        }
    }

    fn tar_type(self) -> tar::EntryType {
        match self {
            Self::Directory => tar::EntryType::Directory,
            Self::Regular => tar::EntryType::Regular,
            Self::Symlink => tar::EntryType::Symlink,
        }
    }
}

/// Package `source` into an archive with every entry rooted at `target`
///
/// A directory yields one entry per file and directory beneath it (the
/// directory itself maps to `target`); a single file yields exactly one
/// entry named `target`. Entry names are relative to `/`, so the archive
/// is meant to be extracted at the container root.
pub fn pack_path(source: &Path, target: &str) -> BoxerResult<PackedArchive> {
    let meta = fs::symlink_metadata(source).map_err(|e| BoxerError::archive(source, e))?;

    // The container root itself is never an entry: it already exists and
    // must keep its own mode
    let root = entry_name(target);
    let mut entries = Vec::new();
    if !root.is_empty() {
        entries.push((root, source.to_path_buf()));
    } else if !meta.is_dir() {
        return Err(BoxerError::archive(
            source,
            io::Error::other("a file cannot be copied onto /"),
        ));
    }
    if meta.is_dir() {
        let mut children = collect_entries(source, source)?;
        children.sort_by(|a, b| a.0.cmp(&b.0));
        entries.extend(
            children
                .into_iter()
                .map(|(rel, full)| (entry_name(&join_target(target, &rel)), full)),
        );
    }

    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(false);
    let mut hasher = ContentHasher::new();

    for (name, full_path) in &entries {
        debug!("Copy: {} -> /{}", full_path.display(), name);
        append_path(&mut ar, &mut hasher, name, full_path)?;
    }

    let data = ar
        .into_inner()
        .map_err(|e| BoxerError::archive(source, e))?;

    Ok(PackedArchive {
        data,
        digest: hasher.finalize_hex(),
        entries: entries.len(),
    })
}

/// Pull a single file's bytes out of an archive returned by the runtime
///
/// The runtime roots the archive at the requested path's base name.
pub fn extract_file(archive: &[u8], path: &str) -> BoxerResult<Vec<u8>> {
    let wanted = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let read_err = |e: io::Error| BoxerError::io(format!("reading archive for {}", path), e);

    let mut ar = tar::Archive::new(archive);
    for entry in ar.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let name = entry.path().map_err(read_err)?.to_string_lossy().to_string();

        if name.trim_end_matches('/') == wanted {
            let mut content = Vec::new();
            entry.read_to_end(&mut content).map_err(read_err)?;
            return Ok(content);
        }
    }

    Err(BoxerError::ContentNotFound {
        path: path.to_string(),
    })
}

fn join_target(target: &str, rel: &str) -> String {
    format!("{}/{}", target.trim_end_matches('/'), rel)
}

/// Archive name for a container path, relative to `/`
fn entry_name(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Recursively collect (relative_path, full_path) pairs from a directory tree.
fn collect_entries(root: &Path, current: &Path) -> BoxerResult<Vec<(String, PathBuf)>> {
    let mut result = Vec::new();
    let read_dir = fs::read_dir(current).map_err(|e| BoxerError::archive(current, e))?;

    for entry in read_dir {
        let entry = entry.map_err(|e| BoxerError::archive(current, e))?;
        let full = entry.path();
        let rel = full
            .strip_prefix(root)
            .map_err(|e| BoxerError::archive(&full, io::Error::other(format!("path strip: {e}"))))?
            .to_string_lossy()
            .to_string();

        let meta = full
            .symlink_metadata()
            .map_err(|e| BoxerError::archive(&full, e))?;
        if meta.is_dir() {
            result.push((rel, full.clone()));
            result.extend(collect_entries(root, &full)?);
        } else {
            result.push((rel, full));
        }
    }
    Ok(result)
}

fn append_path(
    ar: &mut tar::Builder<Vec<u8>>,
    hasher: &mut ContentHasher,
    name: &str,
    full_path: &Path,
) -> BoxerResult<()> {
    let io_err = |e: io::Error| BoxerError::archive(full_path, e);

    let meta = full_path.symlink_metadata().map_err(io_err)?;
    let file_type = meta.file_type();

    let kind = if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_file() {
        EntryKind::Regular
    } else {
        return Err(io_err(io::Error::other("unsupported file type")));
    };

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(kind.tar_type());
    header.set_mode(file_mode(&meta));
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime_secs(&meta));

    hasher.update(&[kind.tag()]);
    hasher.update(name.as_bytes());
    hasher.update(&[0]);

    match kind {
        EntryKind::Directory => {
            header.set_size(0);
            ar.append_data(&mut header, name, io::empty())
                .map_err(io_err)
        }
        EntryKind::Regular => {
            hasher.update(digest_file(full_path)?.as_bytes());
            let file = File::open(full_path).map_err(io_err)?;
            header.set_size(meta.len());
            ar.append_data(&mut header, name, file).map_err(io_err)
        }
        EntryKind::Symlink => {
            let link = fs::read_link(full_path).map_err(io_err)?;
            hasher.update(link.to_string_lossy().as_bytes());
            header.set_size(0);
            ar.append_link(&mut header, name, &link).map_err(io_err)
        }
    }
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

fn mtime_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
