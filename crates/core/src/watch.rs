//! Polling watcher over the configured watch directories.
//!
//! The first scan only records what exists. Later ticks compare size and
//! modification time against the previous scan and turn differences into
//! events, each of which waits the debounce delay and then runs one
//! ingestion. The delay does not detect unfinished writes, so a file still
//! being copied can be picked up early and again once it changes.

use crate::{
    config::DirectoryConfig,
    ingest::{discover_files, BatchSummary, IngestionPipeline},
    traits::{ContentParser, DocumentIndex},
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WatchEventKind {
    Created,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
    pub directory_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    size: u64,
    modified: Option<SystemTime>,
}

fn scan(directory: &DirectoryConfig) -> HashMap<PathBuf, FileStamp> {
    let (files, _) = discover_files(directory);
    files
        .into_iter()
        .filter_map(|path| {
            let stat = fs::metadata(&path).ok()?;
            let stamp = FileStamp {
                size: stat.len(),
                modified: stat.modified().ok(),
            };
            Some((path, stamp))
        })
        .collect()
}

pub struct WatchLoop<'a, I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    pipeline: &'a IngestionPipeline<I, P>,
    directories: Vec<DirectoryConfig>,
    seen: Vec<HashMap<PathBuf, FileStamp>>,
    baseline_taken: bool,
}

impl<'a, I, P> WatchLoop<'a, I, P>
where
    I: DocumentIndex,
    P: ContentParser,
{
    /// Directories that are disabled or not marked `watch` are ignored.
    pub fn new(pipeline: &'a IngestionPipeline<I, P>, directories: Vec<DirectoryConfig>) -> Self {
        let directories: Vec<_> = directories
            .into_iter()
            .filter(|directory| directory.enabled && directory.watch)
            .collect();
        let seen = vec![HashMap::new(); directories.len()];
        Self {
            pipeline,
            directories,
            seen,
            baseline_taken: false,
        }
    }

    pub fn directories(&self) -> &[DirectoryConfig] {
        &self.directories
    }

    /// Rescans every directory. The first call emits nothing.
    pub fn poll(&mut self) -> Vec<WatchEvent> {
        let mut events = Vec::new();

        for (directory, seen) in self.directories.iter().zip(self.seen.iter_mut()) {
            if !directory.path.is_dir() {
                if !self.baseline_taken {
                    warn!(path = %directory.path.display(), "watch directory does not exist");
                }
                continue;
            }

            let current = scan(directory);
            if self.baseline_taken {
                let mut changed: Vec<_> = current
                    .iter()
                    .filter_map(|(path, stamp)| {
                        let kind = match seen.get(path) {
                            None => WatchEventKind::Created,
                            Some(previous) if previous != stamp => WatchEventKind::Modified,
                            Some(_) => return None,
                        };
                        Some(WatchEvent {
                            kind,
                            path: path.clone(),
                            directory_id: directory.id.clone(),
                        })
                    })
                    .collect();
                changed.sort_by(|left, right| left.path.cmp(&right.path));
                events.extend(changed);
            }
            *seen = current;
        }

        self.baseline_taken = true;
        events
    }

    /// Polls until `shutdown` resolves. Shutdown is observed while waiting,
    /// never during an ingestion, so an in-flight file always completes.
    pub async fn run<F>(mut self, shutdown: F) -> BatchSummary
    where
        F: Future<Output = ()>,
    {
        let poll_interval = self.pipeline.options().watch_poll_interval;
        let debounce = self.pipeline.options().watch_debounce;
        tokio::pin!(shutdown);

        for directory in &self.directories {
            info!(path = %directory.path.display(), recursive = directory.recursive, "watching");
        }
        self.poll();

        let mut summary = BatchSummary::default();
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(poll_interval) => {}
            }

            for event in self.poll() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        info!("watch loop stopped");
                        return summary;
                    }
                    _ = tokio::time::sleep(debounce) => {}
                }

                info!(path = %event.path.display(), kind = ?event.kind, "change detected");
                let outcome = self.pipeline.ingest_file(&event.path, &event.directory_id).await;
                if let Err(ingest_error) = &outcome {
                    error!(path = %event.path.display(), error = %ingest_error, "watched file skipped");
                }
                summary = summary.record(&outcome);
            }
        }

        info!("watch loop stopped");
        summary
    }
}
