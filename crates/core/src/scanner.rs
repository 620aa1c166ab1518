//! Walks a directory tree and classifies each file as the caller pulls it.

use crate::classifier::{Classification, Classifier};
use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct ScanItem {
    pub path: PathBuf,
    pub classification: Classification,
}

impl ScanItem {
    pub fn category(&self) -> &str {
        &self.classification.category
    }
}

type Entries = Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>;

/// A lazy, depth-first classification pass over one root. Nothing is read or
/// sent anywhere until [`Scan::next`] is awaited, and dropping the scan stops
/// it. To start over, build a new one from the same root.
pub struct Scan<'a> {
    classifier: &'a Classifier,
    entries: Entries,
}

impl<'a> Scan<'a> {
    pub fn new(
        classifier: &'a Classifier,
        root: impl AsRef<Path>,
        excludes: &[String],
    ) -> anyhow::Result<Self> {
        let exclude_set = build_globset(excludes)?;
        let entries = WalkDir::new(root.as_ref())
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| !exclude_set.is_match(e.path()));
        Ok(Self {
            classifier,
            entries: Box::new(entries),
        })
    }

    /// Classifies the next file in the walk. Walk, read and service errors are
    /// returned as they happen; callers that bail on the first one get
    /// fail-fast behavior.
    pub async fn next(&mut self) -> Option<anyhow::Result<ScanItem>> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e).context("walking scan root")),
            };
            if entry.file_type().is_dir() {
                continue;
            }
            return Some(self.classify(entry.into_path()).await);
        }
    }

    async fn classify(&self, path: PathBuf) -> anyhow::Result<ScanItem> {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        let classification = self
            .classifier
            .classify_text(&text)
            .await
            .with_context(|| format!("Failed to classify {:?}", path))?;
        info!(path = %path.display(), category = %classification.category, "classified");
        Ok(ScanItem {
            path,
            classification,
        })
    }
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
