//! Turning leftover pending rows into a resume plan.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::journal::PendingPath;
use crate::mode::ModeKind;

/// One path to re-crawl and the modes it is pending for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub path: PathBuf,
    pub modes: Vec<ModeKind>,
}

/// Builds the resume plan for a set of pending rows.
///
/// Per mode, rows below another pending row of the same mode are dropped
/// because re-crawling the ancestor reaches them anyway. Paths that remain
/// pending for several modes are crawled once for all of them.
pub fn plan(pending: Vec<PendingPath>) -> Vec<ResumeTarget> {
    let mut by_mode: HashMap<ModeKind, Vec<PathBuf>> = HashMap::new();
    for row in pending {
        by_mode.entry(row.mode).or_default().push(row.path);
    }

    let mut by_path: BTreeMap<PathBuf, Vec<ModeKind>> = BTreeMap::new();
    for (mode, paths) in by_mode {
        for path in coalesce_paths(paths) {
            by_path.entry(path).or_default().push(mode);
        }
    }

    by_path
        .into_iter()
        .map(|(path, mut modes)| {
            modes.sort_unstable();
            ResumeTarget { path, modes }
        })
        .collect()
}

/// Computes the minimal set of paths covering every input path.
///
/// `Path` ordering compares component-wise, so after sorting every
/// descendant sits directly behind its nearest selected ancestor and one
/// comparison against the last kept path is enough.
///
/// ```text
/// Input:  ["/a/b/c", "/a/b", "/a/b/d", "/x/y"]
/// Output: ["/a/b", "/x/y"]
/// ```
pub fn coalesce_paths(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort_unstable();
    paths.dedup();

    let mut cover: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        let covered = cover.last().is_some_and(|kept| path.starts_with(kept));
        if !covered {
            cover.push(path);
        }
    }
    cover
}
