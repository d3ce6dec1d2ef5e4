//! Runs a full or resumed crawl into in-memory indexes and reports the
//! journal state.
//!
//! Usage: `cargo run --bin index-crawl -- [--config <dir>]`

use std::path::PathBuf;
use std::sync::Arc;

use indexer::{
    AliasTable, Bus, Crawler, CrawlerParts, Index, IndexingConfig, IndexingError, IndexingEvent,
    Journal, JsonFileSettings, MemoryIndex, ModeIndexes, ModeRegistry, SettingsKey,
    SettingsStore,
};

fn config_dir() -> Result<PathBuf, IndexingError> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from).ok_or_else(|| {
                IndexingError::Config("--config requires a directory".to_string())
            });
        }
    }
    Ok(std::env::current_dir()?)
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    env_logger::init();

    let dir = config_dir()?;
    let config = IndexingConfig::load_or_create(&dir)?;
    log::info!("using indexing config in {}", dir.display());

    let journal = Journal::open(&config.journal_path)?;
    let settings = Arc::new(JsonFileSettings::new(config.settings_path.clone()));
    let aliases = AliasTable::load_or_empty(config.alias_path.as_deref());

    let default = Arc::new(MemoryIndex::new());
    let name = Arc::new(MemoryIndex::new());
    let content = Arc::new(MemoryIndex::new());
    let modes = ModeRegistry::new(
        config.default_targets.clone(),
        config.document_targets.clone(),
        ModeIndexes {
            default: default.clone(),
            name: name.clone(),
            content: content.clone(),
        },
    );

    let bus = Bus::default();
    let crawler = Crawler::new(CrawlerParts {
        modes,
        aliases,
        journal: journal.clone(),
        settings: settings.clone(),
        bus: bus.clone(),
        ignored_paths: config.ignored_paths.clone(),
    });

    for key in [SettingsKey::DefaultIndexFinished, SettingsKey::DocumentIndexFinished] {
        log::info!("{} = {}", key.as_str(), settings.get_flag(key));
    }

    // Leftover rows mean the previous run stopped mid-crawl.
    let leftover = journal.pending(None).await.len();
    if leftover > 0 {
        log::info!("resuming {leftover} pending rows");
        let resumed = crawler
            .resume()
            .await
            .await
            .map_err(|error| IndexingError::Internal(format!("resume task failed: {error}")))?;
        log::info!("resumed {resumed} frontier paths");
    } else {
        let mut events = bus.subscribe();
        let default_crawl = crawler.index_default().await;
        let document_crawl = crawler.index_documents().await;

        let mut remaining = 2;
        while remaining > 0 {
            match events.recv().await {
                Ok(IndexingEvent::DefaultIndexingDidFinish)
                | Ok(IndexingEvent::DocumentIndexingDidFinish) => remaining -= 1,
                Ok(event) => log::debug!("{}", event.name()),
                Err(error) => {
                    log::warn!("event bus closed early: {error}");
                    break;
                }
            }
        }

        for (label, handle) in [("default", default_crawl), ("document", document_crawl)] {
            match handle.await {
                Ok(stats) => log::info!("{label} crawl: {stats:?}"),
                Err(error) => log::warn!("{label} crawl task failed: {error}"),
            }
        }
    }

    journal.flush().await;
    log::info!(
        "documents: default={} name={} content={}",
        default.len(),
        name.len(),
        content.len()
    );
    log::info!("pending rows left: {}", journal.pending(None).await.len());
    for failure in journal.failures().await {
        log::info!("failed: {} ({})", failure.path.display(), failure.reason);
    }
    Ok(())
}
