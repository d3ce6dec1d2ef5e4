//! Depth-first traversal shared by every crawl.
//!
//! One walk serves a set of active modes. Per directory the order is fixed:
//! the directory document, then its files, then the journal frontier moves
//! to its surviving subdirectories, then the walk recurses into them. The
//! journal therefore never claims a directory finished before its files are
//! in the index.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use crate::alias::AliasTable;
use crate::exclusion::ExclusionPolicy;
use crate::journal::Journal;
use crate::mode::IndexMode;

/// Directory extensions the platform presents as single files.
const PACKAGE_EXTENSIONS: &[&str] = &[
    "app",
    "bundle",
    "framework",
    "plugin",
    "kext",
    "prefpane",
    "qlgenerator",
    "xpc",
    "appex",
    "photoslibrary",
    "musiclibrary",
    "pkg",
    "mpkg",
    "rtfd",
    "xcodeproj",
    "xcworkspace",
    "playground",
];

/// Counters for one traversal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub files: usize,
    pub directories: usize,
    pub symlinks_skipped: usize,
    pub documents_added: usize,
    pub documents_excluded: usize,
    pub add_failures: usize,
    pub enumeration_failures: usize,
}

impl CrawlStats {
    pub fn merge(&mut self, other: CrawlStats) {
        self.files += other.files;
        self.directories += other.directories;
        self.symlinks_skipped += other.symlinks_skipped;
        self.documents_added += other.documents_added;
        self.documents_excluded += other.documents_excluded;
        self.add_failures += other.add_failures;
        self.enumeration_failures += other.enumeration_failures;
    }
}

pub(crate) struct Walker<'a> {
    modes: &'a [&'a IndexMode],
    aliases: &'a AliasTable,
    journal: &'a Journal,
    ignored_paths: &'a [PathBuf],
    stats: CrawlStats,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(
        modes: &'a [&'a IndexMode],
        aliases: &'a AliasTable,
        journal: &'a Journal,
        ignored_paths: &'a [PathBuf],
    ) -> Self {
        Self {
            modes,
            aliases,
            journal,
            ignored_paths,
            stats: CrawlStats::default(),
        }
    }

    pub(crate) fn finish(self) -> CrawlStats {
        self.stats
    }

    /// Indexes `path` and, if it is a directory, everything below it.
    pub(crate) fn walk(&mut self, path: &Path) {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) => {
                self.record_failure(path, &error);
                return;
            }
        };

        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            self.stats.symlinks_skipped += 1;
            return;
        }
        if file_type.is_dir() && !is_package(path) {
            self.visit_directory(path);
        } else if file_type.is_file() || file_type.is_dir() {
            self.visit_file(path);
        }
    }

    fn visit_file(&mut self, path: &Path) {
        self.stats.files += 1;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|extension| extension.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let alias = self.aliases.alias(&name);
        let note = (!alias.is_empty()).then_some(alias.as_str());

        for mode in self.modes {
            if mode.policy().is_excluded(&extension) {
                self.stats.documents_excluded += 1;
                continue;
            }
            match mode.index().add_document(path, note) {
                Ok(_) => self.stats.documents_added += 1,
                Err(error) => {
                    self.stats.add_failures += 1;
                    log::debug!(
                        "{} index rejected {}: {error}",
                        mode.kind(),
                        path.display()
                    );
                }
            }
        }
    }

    fn visit_directory(&mut self, path: &Path) {
        let Some(directories) = self.expand_directory(path) else {
            return;
        };
        for directory in &directories {
            self.walk(directory);
        }
    }

    /// Indexes the directory and its files, then moves the journal frontier
    /// to the surviving subdirectories and returns them.
    ///
    /// Returns `None` if the directory could not be enumerated; its pending
    /// row is left in place.
    fn expand_directory(&mut self, path: &Path) -> Option<Vec<PathBuf>> {
        self.stats.directories += 1;
        for mode in self.modes.iter().filter(|mode| mode.include_dirs()) {
            match mode.index().add_document(path, None) {
                Ok(_) => self.stats.documents_added += 1,
                Err(error) => {
                    self.stats.add_failures += 1;
                    log::debug!(
                        "{} index rejected directory {}: {error}",
                        mode.kind(),
                        path.display()
                    );
                }
            }
        }

        let (files, mut directories) = match list_children(path) {
            Ok(children) => children,
            Err(error) => {
                self.record_failure(path, &error);
                return None;
            }
        };

        for file in &files {
            self.walk(file);
        }

        directories.retain(|directory| !self.is_excluded_directory(directory));

        // Mark the children before clearing the directory itself.
        for mode in self.modes {
            let kind = mode.kind();
            for directory in &directories {
                self.journal.submit_mark_pending(directory.clone(), kind);
            }
            self.journal.submit_clear_pending(path, kind);
        }
        log::debug!(
            "crawled {} ({} files, {} subdirectories)",
            path.display(),
            files.len(),
            directories.len()
        );

        Some(directories)
    }

    fn is_excluded_directory(&self, path: &Path) -> bool {
        let excluded_name = path
            .file_name()
            .map(|name| ExclusionPolicy::is_excluded_directory(&name.to_string_lossy()))
            .unwrap_or(false);
        excluded_name
            || ExclusionPolicy::is_excluded_path(path)
            || path_is_ignored(self.ignored_paths, path)
    }

    fn record_failure(&mut self, path: &Path, error: &std::io::Error) {
        self.stats.enumeration_failures += 1;
        log::warn!("unable to enumerate {}: {error}", path.display());
        self.journal.submit_failure(path, error.to_string());
    }
}

/// Immediate children split into (files, directories), hidden entries
/// skipped, each half sorted by name.
///
/// Symlinks and packages land in the file half; the walk decides what to do
/// with them.
fn list_children(path: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut directories = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                log::debug!("skipping unreadable entry in {}: {error}", path.display());
                continue;
            }
        };
        if is_hidden(&entry.file_name()) {
            continue;
        }
        let child = entry.path();
        let is_dir = entry
            .file_type()
            .map(|file_type| file_type.is_dir())
            .unwrap_or(false);
        if is_dir && !is_package(&child) {
            directories.push(child);
        } else {
            files.push(child);
        }
    }

    files.sort_unstable();
    directories.sort_unstable();
    Ok((files, directories))
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn is_package(path: &Path) -> bool {
    path.extension()
        .map(|extension| {
            let extension = extension.to_string_lossy().to_lowercase();
            PACKAGE_EXTENSIONS.contains(&extension.as_str())
        })
        .unwrap_or(false)
}

/// Checks if a path is one of, or below one of, the ignored roots.
fn path_is_ignored(ignored_roots: &[PathBuf], candidate: &Path) -> bool {
    ignored_roots
        .iter()
        .any(|ignored| candidate == ignored || candidate.starts_with(ignored))
}
