//! Exclusion rules applied while crawling.
//!
//! Extension exclusion is per mode and composed from [`ExclusionGroup`]s.
//! Directory-name and path exclusion are static and apply to every mode.

use std::collections::HashSet;
use std::path::Path;

/// Compiled bytecode, object files, and cache/temp artifacts.
const CODING_EXTENSIONS: &[&str] = &[
    "pyc", "pyo", "class", "o", "obj", "elc", "pch", "gch", "dep", "d", "cache", "tmp", "swp",
    "swo",
];

/// Media is searchable by name only, never by content.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "wav", "flac", "ogg", "aiff", "mp4", "m4v", "mov", "avi", "mkv", "wmv",
    "webm", "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "heic", "webp", "psd", "raw",
];

const EXCLUDED_DIRECTORY_NAMES: &[&str] = &[
    "cache",
    "caches",
    "log",
    "logs",
    "locale",
    "locales",
    "localization",
    "localizations",
];

/// Localized resource bundles on macOS (`en.lproj`, `Base.lproj`, ...).
const LOCALE_DIRECTORY_SUFFIX: &str = ".lproj";

const EXCLUDED_PATH_PREFIXES: &[&str] = &[
    "/System/Library",
    "/Library/Caches",
    "/private/var/vm",
    "/dev",
    "/proc",
    "/sys",
];

/// A named group of excluded file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExclusionGroup {
    Coding,
    Media,
}

impl ExclusionGroup {
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Coding => CODING_EXTENSIONS,
            Self::Media => MEDIA_EXTENSIONS,
        }
    }
}

/// The extension denylist of one index mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionPolicy {
    extensions: HashSet<&'static str>,
}

impl ExclusionPolicy {
    /// A policy that excludes no extension.
    pub fn none() -> Self {
        Self::default()
    }

    /// Union of the extension sets of `groups`.
    pub fn from_groups(groups: &[ExclusionGroup]) -> Self {
        let extensions = groups
            .iter()
            .flat_map(|group| group.extensions().iter().copied())
            .collect();
        Self { extensions }
    }

    /// Returns true if files with `extension` are skipped.
    ///
    /// Matching is case-insensitive and tolerates a leading dot.
    pub fn is_excluded(&self, extension: &str) -> bool {
        let extension = extension.strip_prefix('.').unwrap_or(extension);
        if extension.is_empty() {
            return false;
        }
        self.extensions
            .contains(extension.to_ascii_lowercase().as_str())
    }

    /// Directory names skipped for every mode (cache, log, locale folders).
    pub fn is_excluded_directory(name: &str) -> bool {
        let name = name.to_lowercase();
        EXCLUDED_DIRECTORY_NAMES.contains(&name.as_str()) || name.ends_with(LOCALE_DIRECTORY_SUFFIX)
    }

    /// Static denylist of system-reserved locations.
    pub fn is_excluded_path(path: &Path) -> bool {
        EXCLUDED_PATH_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
    }
}
