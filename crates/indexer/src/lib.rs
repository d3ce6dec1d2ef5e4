//! Resumable filesystem crawling for search indexes.
//!
//! The crawler walks configured roots and feeds every file (and, for some
//! modes, every directory) into one or more indexes. A durable journal of
//! pending directories lets an interrupted crawl pick up where it stopped.
//!
//! - [`exclusion`]: extension, directory-name, and path denylists
//! - [`alias`]: alternate names attached to documents as notes
//! - [`mode`]: the default, name, and content index modes
//! - [`journal`]: pending/failed path tables behind a single writer
//! - [`crawler`]: entry points, traversal, and resumption

pub mod alias;
pub mod bus;
pub mod config;
pub mod crawler;
pub mod error;
pub mod exclusion;
pub mod index;
pub mod journal;
pub mod mode;
pub mod settings;

pub use alias::AliasTable;
pub use bus::{Bus, IndexingEvent};
pub use config::IndexingConfig;
pub use crawler::{CrawlStats, Crawler, CrawlerParts};
pub use error::{IndexingError, Result};
pub use exclusion::{ExclusionGroup, ExclusionPolicy};
pub use index::{DocId, Index, IndexError, MemoryIndex};
pub use journal::{FailedPath, Journal, PendingPath};
pub use mode::{IndexMode, ModeIndexes, ModeKind, ModeRegistry};
pub use settings::{JsonFileSettings, MemorySettings, SettingsKey, SettingsStore};
