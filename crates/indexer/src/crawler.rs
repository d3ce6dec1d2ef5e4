//! Crawl entry points.
//!
//! Each entry point registers its roots as pending before it returns, then
//! walks them on tokio's blocking pool. Finished crawls set their settings
//! flag and announce themselves on the bus.

mod resume;
mod walk;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::alias::AliasTable;
use crate::bus::{Bus, IndexingEvent};
use crate::error::canonicalize_existing_path;
use crate::journal::Journal;
use crate::mode::{IndexMode, ModeKind, ModeRegistry};
use crate::settings::{SettingsKey, SettingsStore};

pub use resume::{coalesce_paths, plan, ResumeTarget};
pub use walk::CrawlStats;

use walk::Walker;

/// Everything a [`Crawler`] needs, injected by the host.
pub struct CrawlerParts {
    pub modes: ModeRegistry,
    pub aliases: AliasTable,
    pub journal: Journal,
    pub settings: Arc<dyn SettingsStore>,
    pub bus: Bus,
    /// Extra subtrees skipped on top of the built-in exclusions. Matched
    /// against canonical walk paths.
    pub ignored_paths: Vec<PathBuf>,
}

#[derive(Clone)]
pub struct Crawler {
    inner: Arc<CrawlerInner>,
}

struct CrawlerInner {
    modes: ModeRegistry,
    aliases: AliasTable,
    journal: Journal,
    settings: Arc<dyn SettingsStore>,
    bus: Bus,
    ignored_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CrawlJob {
    Default,
    Documents,
}

impl CrawlJob {
    fn modes(self) -> &'static [ModeKind] {
        match self {
            Self::Default => &[ModeKind::Default],
            Self::Documents => &[ModeKind::Name, ModeKind::Content],
        }
    }

    fn began(self) -> IndexingEvent {
        match self {
            Self::Default => IndexingEvent::DefaultIndexingDidBegin,
            Self::Documents => IndexingEvent::DocumentIndexingDidBegin,
        }
    }

    fn finished(self) -> IndexingEvent {
        match self {
            Self::Default => IndexingEvent::DefaultIndexingDidFinish,
            Self::Documents => IndexingEvent::DocumentIndexingDidFinish,
        }
    }

    fn flag(self) -> SettingsKey {
        match self {
            Self::Default => SettingsKey::DefaultIndexFinished,
            Self::Documents => SettingsKey::DocumentIndexFinished,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Documents => "document",
        }
    }
}

impl Crawler {
    pub fn new(parts: CrawlerParts) -> Self {
        Self {
            inner: Arc::new(CrawlerInner {
                modes: parts.modes,
                aliases: parts.aliases,
                journal: parts.journal,
                settings: parts.settings,
                bus: parts.bus,
                ignored_paths: parts
                    .ignored_paths
                    .into_iter()
                    .map(canonicalize_existing_path)
                    .collect(),
            }),
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.inner.journal
    }

    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Crawls the default roots for the `default` mode.
    ///
    /// The roots are pending in the journal once this returns; the handle
    /// resolves after the crawl has been announced as finished.
    pub async fn index_default(&self) -> JoinHandle<CrawlStats> {
        self.start(CrawlJob::Default).await
    }

    /// Crawls the document roots for the `name` and `content` modes in one
    /// walk.
    pub async fn index_documents(&self) -> JoinHandle<CrawlStats> {
        self.start(CrawlJob::Documents).await
    }

    /// Re-crawls whatever an interrupted run left pending.
    ///
    /// Resolves to the number of frontier paths revisited. Publishes no
    /// events and leaves the finished flags alone.
    pub async fn resume(&self) -> JoinHandle<usize> {
        let targets = plan(self.inner.journal.pending(None).await);
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            if targets.is_empty() {
                log::debug!("nothing pending, no crawl to resume");
                return 0;
            }
            let count = targets.len();
            log::info!("resuming crawl at {count} pending paths");

            let walker = Arc::clone(&inner);
            let result = tokio::task::spawn_blocking(move || {
                let mut stats = CrawlStats::default();
                for target in &targets {
                    if is_symlink(&target.path) {
                        log::info!("dropping pending symlink {}", target.path.display());
                        for &kind in &target.modes {
                            walker.journal.submit_clear_pending(&target.path, kind);
                        }
                        stats.symlinks_skipped += 1;
                        continue;
                    }
                    stats.merge(walker.walk_roots(
                        std::slice::from_ref(&target.path),
                        &target.modes,
                    ));
                }
                stats
            })
            .await;
            match result {
                Ok(stats) => log::info!("resumed crawl finished: {stats:?}"),
                Err(error) => log::warn!("resumed crawl aborted: {error}"),
            }

            inner.journal.flush().await;
            count
        })
    }

    async fn start(&self, job: CrawlJob) -> JoinHandle<CrawlStats> {
        let roots = self.inner.roots(job);
        for &kind in job.modes() {
            for root in &roots {
                self.inner.journal.mark_pending(root.clone(), kind).await;
            }
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.bus.publish(job.began());
            log::info!("{} crawl started over {} roots", job.label(), roots.len());

            let walker = Arc::clone(&inner);
            let stats = match tokio::task::spawn_blocking(move || {
                walker.walk_roots(&roots, job.modes())
            })
            .await
            {
                Ok(stats) => stats,
                Err(error) => {
                    log::warn!("{} crawl aborted: {error}", job.label());
                    CrawlStats::default()
                }
            };

            inner.journal.flush().await;
            if let Err(error) = inner.settings.set_flag(job.flag(), true) {
                log::warn!("failed to record {}: {error}", job.flag().as_str());
            }
            log::info!("{} crawl finished: {stats:?}", job.label());
            inner.bus.publish(job.finished());
            stats
        })
    }
}

impl CrawlerInner {
    /// The job's roots as walked. Symlinked roots are dropped, the rest are
    /// canonicalized, and a root inside another root is dropped.
    fn roots(&self, job: CrawlJob) -> Vec<PathBuf> {
        let configured = match job {
            CrawlJob::Default => self.modes.get(ModeKind::Default).targets(),
            CrawlJob::Documents => self.modes.document_targets(),
        };
        let roots = configured
            .iter()
            .filter(|root| {
                let linked = is_symlink(root);
                if linked {
                    log::info!("not crawling symlinked root {}", root.display());
                }
                !linked
            })
            .cloned()
            .map(canonicalize_existing_path)
            .collect();
        coalesce_paths(roots)
    }

    fn walk_roots(&self, roots: &[PathBuf], kinds: &[ModeKind]) -> CrawlStats {
        let modes: Vec<&IndexMode> = kinds.iter().map(|&kind| self.modes.get(kind)).collect();
        let mut walker = Walker::new(&modes, &self.aliases, &self.journal, &self.ignored_paths);
        for root in roots {
            log::debug!("walking {} for {kinds:?}", root.display());
            walker.walk(root);
        }
        walker.finish()
    }
}

fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Index, MemoryIndex};
    use crate::journal::PendingPath;
    use crate::mode::ModeIndexes;
    use crate::settings::MemorySettings;
    use std::collections::HashMap;
    use std::fs::File;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    struct Harness {
        crawler: Crawler,
        default: Arc<MemoryIndex>,
        name: Arc<MemoryIndex>,
        content: Arc<MemoryIndex>,
        settings: Arc<MemorySettings>,
    }

    fn harness(default_root: &Path, document_root: &Path) -> Harness {
        harness_with(
            vec![default_root.to_path_buf()],
            vec![document_root.to_path_buf()],
            Vec::new(),
        )
    }

    fn harness_with(
        default_roots: Vec<PathBuf>,
        document_roots: Vec<PathBuf>,
        ignored_paths: Vec<PathBuf>,
    ) -> Harness {
        let default = Arc::new(MemoryIndex::new());
        let name = Arc::new(MemoryIndex::new());
        let content = Arc::new(MemoryIndex::new());
        let settings = Arc::new(MemorySettings::new());
        let modes = ModeRegistry::new(
            default_roots,
            document_roots,
            ModeIndexes {
                default: default.clone(),
                name: name.clone(),
                content: content.clone(),
            },
        );
        let aliases = AliasTable::from_map(HashMap::from([(
            "Calculator.app".to_string(),
            "Number Cruncher".to_string(),
        )]));
        let crawler = Crawler::new(CrawlerParts {
            modes,
            aliases,
            journal: Journal::in_memory().expect("journal"),
            settings: settings.clone(),
            bus: Bus::default(),
            ignored_paths,
        });
        Harness {
            crawler,
            default,
            name,
            content,
            settings,
        }
    }

    /// A temp dir addressed by its canonical path, which is what walks see.
    struct Tree {
        _temp: TempDir,
        root: PathBuf,
    }

    impl Tree {
        fn new() -> Self {
            let temp = TempDir::new().expect("tempdir");
            let root = temp.path().canonicalize().expect("canonical tempdir");
            Self { _temp: temp, root }
        }

        fn path(&self) -> &Path {
            &self.root
        }
    }

    /// apps/{Calculator.app/Contents/Info.plist, readme.txt}
    /// docs/{notes.txt, photo.jpg, build.o, sub/report.md}
    fn build_tree() -> Tree {
        let temp = Tree::new();
        let apps = temp.path().join("apps");
        std::fs::create_dir_all(apps.join("Calculator.app/Contents")).unwrap();
        File::create(apps.join("Calculator.app/Contents/Info.plist")).unwrap();
        File::create(apps.join("readme.txt")).unwrap();

        let docs = temp.path().join("docs");
        std::fs::create_dir_all(docs.join("sub")).unwrap();
        for file in ["notes.txt", "photo.jpg", "build.o", "sub/report.md"] {
            File::create(docs.join(file)).unwrap();
        }
        temp
    }

    async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<IndexingEvent>) -> IndexingEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout")
            .expect("recv")
    }

    #[tokio::test]
    async fn default_crawl_announces_and_sets_flag() {
        let temp = build_tree();
        let apps = temp.path().join("apps");
        let h = harness(&apps, &temp.path().join("docs"));
        let mut rx = h.crawler.bus().subscribe();

        let handle = h.crawler.index_default().await;
        let stats = handle.await.expect("join");

        assert_eq!(next_event(&mut rx).await, IndexingEvent::DefaultIndexingDidBegin);
        assert_eq!(next_event(&mut rx).await, IndexingEvent::DefaultIndexingDidFinish);
        assert!(h.settings.get_flag(SettingsKey::DefaultIndexFinished));
        assert!(!h.settings.get_flag(SettingsKey::DocumentIndexFinished));

        // The package is one document; its contents are not visited.
        assert_eq!(stats.documents_added, 2);
        assert_eq!(h.default.len(), 2);
        assert_eq!(
            h.default.note_for(&apps.join("Calculator.app")).as_deref(),
            Some("Number Cruncher NC")
        );
        assert_eq!(h.default.count_path(&apps.join("Calculator.app/Contents")), 0);
        assert!(h.name.is_empty());
        assert!(h.crawler.journal().pending(None).await.is_empty());
    }

    #[tokio::test]
    async fn document_crawl_feeds_name_and_content() {
        let temp = build_tree();
        let docs = temp.path().join("docs");
        let h = harness(&temp.path().join("apps"), &docs);
        let mut rx = h.crawler.bus().subscribe();

        h.crawler.index_documents().await.await.expect("join");

        assert_eq!(next_event(&mut rx).await, IndexingEvent::DocumentIndexingDidBegin);
        assert_eq!(next_event(&mut rx).await, IndexingEvent::DocumentIndexingDidFinish);
        assert!(h.settings.get_flag(SettingsKey::DocumentIndexFinished));

        // Name: two directories plus every non-coding file.
        assert_eq!(h.name.count_path(&docs), 1);
        assert_eq!(h.name.count_path(&docs.join("sub")), 1);
        assert_eq!(h.name.count_path(&docs.join("photo.jpg")), 1);
        assert_eq!(h.name.count_path(&docs.join("build.o")), 0);
        assert_eq!(h.name.len(), 5);

        // Content: files only, no media, no coding artifacts.
        assert_eq!(h.content.count_path(&docs), 0);
        assert_eq!(h.content.count_path(&docs.join("photo.jpg")), 0);
        assert_eq!(h.content.count_path(&docs.join("notes.txt")), 1);
        assert_eq!(h.content.count_path(&docs.join("sub/report.md")), 1);
        assert_eq!(h.content.len(), 2);

        assert!(h.default.is_empty());
        assert!(h.crawler.journal().pending(None).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn entry_points_run_concurrently() {
        let temp = build_tree();
        let h = harness(&temp.path().join("apps"), &temp.path().join("docs"));

        let default = h.crawler.index_default().await;
        let documents = h.crawler.index_documents().await;
        let (default, documents) = tokio::join!(default, documents);

        assert_eq!(default.expect("default").documents_added, 2);
        assert_eq!(documents.expect("documents").documents_added, 7);
        assert!(h.crawler.journal().pending(None).await.is_empty());
    }

    #[tokio::test]
    async fn missing_root_keeps_its_pending_row() {
        let temp = build_tree();
        let missing = temp.path().join("gone");
        let h = harness(&missing, &temp.path().join("docs"));

        let stats = h.crawler.index_default().await.await.expect("join");

        assert_eq!(stats.enumeration_failures, 1);
        assert_eq!(h.crawler.journal().failure_count(&missing).await, 1);
        assert_eq!(
            h.crawler.journal().pending(None).await,
            vec![PendingPath::new(&missing, ModeKind::Default)]
        );
        // Still announced as finished.
        assert!(h.settings.get_flag(SettingsKey::DefaultIndexFinished));
    }

    #[tokio::test]
    async fn resume_revisits_only_the_pending_frontier() {
        let temp = build_tree();
        let docs = temp.path().join("docs");
        let h = harness(&temp.path().join("apps"), &docs);
        let journal = h.crawler.journal();

        // An interrupted document crawl that had already finished `docs`
        // itself and left `sub` pending for both document modes.
        journal.mark_pending(docs.join("sub"), ModeKind::Name).await;
        journal.mark_pending(docs.join("sub"), ModeKind::Content).await;

        let mut rx = h.crawler.bus().subscribe();
        let resumed = h.crawler.resume().await.await.expect("join");

        assert_eq!(resumed, 1);
        assert_eq!(h.name.count_path(&docs.join("sub")), 1);
        assert_eq!(h.name.count_path(&docs.join("sub/report.md")), 1);
        assert_eq!(h.name.count_path(&docs.join("notes.txt")), 0);
        assert_eq!(h.content.count_path(&docs.join("sub/report.md")), 1);
        assert_eq!(h.content.len(), 1);
        assert!(journal.pending(None).await.is_empty());

        assert!(rx.try_recv().is_err());
        assert!(!h.settings.get_flag(SettingsKey::DocumentIndexFinished));
    }

    #[tokio::test]
    async fn resume_with_nothing_pending_is_a_no_op() {
        let temp = build_tree();
        let h = harness(&temp.path().join("apps"), &temp.path().join("docs"));
        assert_eq!(h.crawler.resume().await.await.expect("join"), 0);
        assert!(h.name.is_empty());
    }

    #[tokio::test]
    async fn nested_roots_are_walked_once() {
        let temp = build_tree();
        let docs = temp.path().join("docs");
        let h = harness_with(
            vec![temp.path().join("apps")],
            vec![docs.join("sub"), docs.clone()],
            Vec::new(),
        );

        let stats = h.crawler.index_documents().await.await.expect("join");

        assert_eq!(h.name.count_path(&docs.join("sub")), 1);
        assert_eq!(h.name.count_path(&docs.join("sub/report.md")), 1);
        assert_eq!(h.content.count_path(&docs.join("sub/report.md")), 1);
        assert_eq!(stats.documents_added, 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_root_is_never_journaled() {
        let temp = build_tree();
        let link = temp.path().join("docs-link");
        std::os::unix::fs::symlink(temp.path().join("docs"), &link).unwrap();
        let h = harness(&temp.path().join("apps"), &link);

        let stats = h.crawler.index_documents().await.await.expect("join");

        assert_eq!(stats.files, 0);
        assert!(h.name.is_empty());
        assert!(h.crawler.journal().pending(None).await.is_empty());
        assert!(h.settings.get_flag(SettingsKey::DocumentIndexFinished));
        assert_eq!(h.crawler.resume().await.await.expect("join"), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resume_clears_rows_left_on_symlinks() {
        let temp = build_tree();
        let link = temp.path().join("docs-link");
        std::os::unix::fs::symlink(temp.path().join("docs"), &link).unwrap();
        let h = harness(&temp.path().join("apps"), &temp.path().join("docs"));
        let journal = h.crawler.journal();
        journal.mark_pending(&link, ModeKind::Name).await;
        journal.mark_pending(&link, ModeKind::Content).await;

        assert_eq!(h.crawler.resume().await.await.expect("join"), 1);

        assert!(journal.pending(None).await.is_empty());
        assert!(h.name.is_empty());
        assert!(h.content.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ignored_paths_match_through_symlinked_ancestors() {
        let temp = build_tree();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(temp.path(), &link).unwrap();
        let h = harness_with(
            vec![temp.path().join("apps")],
            vec![link.join("docs")],
            vec![link.join("docs/sub")],
        );

        h.crawler.index_documents().await.await.expect("join");

        let docs = temp.path().join("docs");
        assert_eq!(h.content.count_path(&docs.join("notes.txt")), 1);
        assert_eq!(h.content.count_path(&docs.join("sub/report.md")), 0);
        assert_eq!(h.name.count_path(&docs.join("sub")), 0);
        assert_eq!(h.content.len(), 1);
        assert!(h.crawler.journal().pending(None).await.is_empty());
    }
}
