//! Directory traversal producing file entries

use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file discovered under one of the scan roots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub absolute_path: PathBuf,
    /// Path relative to the root the entry was found under
    pub relative_path: PathBuf,
    /// Lower-cased extension without the dot, empty when there is none
    pub extension: String,
}

impl FileEntry {
    /// Build an entry for `path`, found while walking `root`
    pub fn new(root: &Path, path: &Path) -> io::Result<Self> {
        let relative_path = match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path.file_name().map(PathBuf::from).unwrap_or_default(),
        };

        Ok(Self {
            absolute_path: std::path::absolute(path)?,
            relative_path,
            extension: extension_of(path),
        })
    }

    /// Key identifying this file in a report
    pub fn report_key(&self, relative: bool) -> String {
        let path = if relative {
            &self.relative_path
        } else {
            &self.absolute_path
        };
        path.to_string_lossy().into_owned()
    }
}

/// Lower-cased extension of `path`, or an empty string
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Lazily walk every root and yield the regular files below it
///
/// Symbolic links are never followed, so a directory only reachable through
/// a link is not entered. With `recursive == false` only the immediate
/// children of each root are visited. Errors for individual directory
/// entries are yielded in place and do not end the walk.
///
/// # Arguments
/// * `roots` - Directories to walk, in order
/// * `recursive` - Whether to descend into subdirectories
///
/// # Returns
/// Lazy iterator over the files found, each tied to the root it came from
pub fn scan(
    roots: &[PathBuf],
    recursive: bool,
) -> impl Iterator<Item = io::Result<FileEntry>> + '_ {
    let max_depth = if recursive { usize::MAX } else { 1 };

    roots.iter().flat_map(move |root| {
        WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    Some(FileEntry::new(root, entry.path()))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            })
    })
}
