//! Index modes and the fixed mode registry.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::exclusion::{ExclusionGroup, ExclusionPolicy};
use crate::index::Index;

/// The three indexing configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModeKind {
    /// Coarse system locations (applications), directories not indexed.
    Default,
    /// Broad filename index.
    Name,
    /// Full-text index.
    Content,
}

impl ModeKind {
    pub const ALL: [ModeKind; 3] = [Self::Default, Self::Name, Self::Content];

    pub fn identifier(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Name => "name",
            Self::Content => "content",
        }
    }

    /// Category code stored in journal rows.
    pub fn category(self) -> i64 {
        match self {
            Self::Default => 0,
            Self::Name => 1,
            Self::Content => 2,
        }
    }

    pub fn from_category(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Default),
            1 => Some(Self::Name),
            2 => Some(Self::Content),
            _ => None,
        }
    }

    pub fn includes_directories(self) -> bool {
        match self {
            Self::Default => false,
            Self::Name => true,
            Self::Content => false,
        }
    }

    pub fn policy(self) -> ExclusionPolicy {
        match self {
            Self::Default => ExclusionPolicy::none(),
            Self::Name => ExclusionPolicy::from_groups(&[ExclusionGroup::Coding]),
            Self::Content => {
                ExclusionPolicy::from_groups(&[ExclusionGroup::Coding, ExclusionGroup::Media])
            }
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// One configured mode: where to crawl, what to skip, and where to write.
#[derive(Clone)]
pub struct IndexMode {
    kind: ModeKind,
    include_dirs: bool,
    targets: Vec<PathBuf>,
    policy: ExclusionPolicy,
    index: Arc<dyn Index>,
}

impl fmt::Debug for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexMode")
            .field("kind", &self.kind)
            .field("include_dirs", &self.include_dirs)
            .field("targets", &self.targets)
            .field("index", &"<index>")
            .finish()
    }
}

impl IndexMode {
    pub fn new(kind: ModeKind, targets: Vec<PathBuf>, index: Arc<dyn Index>) -> Self {
        Self {
            kind,
            include_dirs: kind.includes_directories(),
            targets,
            policy: kind.policy(),
            index,
        }
    }

    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn include_dirs(&self) -> bool {
        self.include_dirs
    }

    pub fn targets(&self) -> &[PathBuf] {
        &self.targets
    }

    pub fn policy(&self) -> &ExclusionPolicy {
        &self.policy
    }

    pub fn index(&self) -> &dyn Index {
        self.index.as_ref()
    }
}

/// The registry of all three modes.
///
/// `name` and `content` share their root targets so a single walk feeds both.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    default: IndexMode,
    name: IndexMode,
    content: IndexMode,
}

impl ModeRegistry {
    pub fn new(
        default_targets: Vec<PathBuf>,
        document_targets: Vec<PathBuf>,
        indexes: ModeIndexes,
    ) -> Self {
        Self {
            default: IndexMode::new(ModeKind::Default, default_targets, indexes.default),
            name: IndexMode::new(ModeKind::Name, document_targets.clone(), indexes.name),
            content: IndexMode::new(ModeKind::Content, document_targets, indexes.content),
        }
    }

    pub fn get(&self, kind: ModeKind) -> &IndexMode {
        match kind {
            ModeKind::Default => &self.default,
            ModeKind::Name => &self.name,
            ModeKind::Content => &self.content,
        }
    }

    pub fn document_targets(&self) -> &[PathBuf] {
        self.name.targets()
    }
}

/// One index handle per mode.
#[derive(Clone)]
pub struct ModeIndexes {
    pub default: Arc<dyn Index>,
    pub name: Arc<dyn Index>,
    pub content: Arc<dyn Index>,
}

/// Application folders crawled by the default mode. Walks are recursive, so
/// nested folders such as `Utilities` need no entry of their own.
pub fn default_targets() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/Applications"),
        PathBuf::from("/System/Applications"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        dirs.push(PathBuf::from(home).join("Applications"));
    }
    dirs
}

/// Roots crawled by the name and content modes.
pub fn document_targets() -> Vec<PathBuf> {
    std::env::var("HOME")
        .map(|home| vec![PathBuf::from(home)])
        .unwrap_or_default()
}
