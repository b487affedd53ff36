//! Drives a board table through the classifier with periodic checkpoints.
//!
//! A run loads the input, optionally picks up where an earlier checkpoint stopped, labels the
//! remaining rows one at a time in table order and flushes the labeled prefix every `batch_size`
//! rows. The final flush writes the whole table. Only load and flush errors abort a run.

use chrono::Local;
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::rate_limit::RateLimiter;
use crate::record::{RecordKind, RecordTable};
use crate::report::LabelSummary;
use crate::scorer::Scorer;
use crate::table::{CheckpointStore, RecordSource};
use crate::{info_time, Error, Result};

/// Per-run choices.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub kind: RecordKind,
    /// Start here and ignore any checkpoint.
    pub start_index: Option<usize>,
    /// Continue after the rows of an existing checkpoint.
    pub resume: bool,
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub start_index: usize,
    pub processed: usize,
    pub flushes: usize,
    pub summary: LabelSummary,
}

pub struct BatchRunner<S, R> {
    classifier: Classifier<S, R>,
    batch_size: usize,
}

impl<S: Scorer, R: RateLimiter> BatchRunner<S, R> {
    pub fn new(classifier: Classifier<S, R>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be at least 1".into()));
        }
        Ok(Self {
            classifier,
            batch_size,
        })
    }

    pub fn classifier(&self) -> &Classifier<S, R> {
        &self.classifier
    }

    pub async fn run<Src, Ck>(
        &self,
        source: &Src,
        store: &mut Ck,
        options: RunOptions,
    ) -> Result<RunReport>
    where
        Src: RecordSource + ?Sized,
        Ck: CheckpointStore + ?Sized,
    {
        let start_time = Local::now();
        let kind = options.kind;

        let fresh = source.load()?;
        info!(
            rows = fresh.len(),
            path = %source.source_path().display(),
            "loaded {}",
            kind.display_name()
        );
        for column in kind.text_columns() {
            if fresh.column_index(column).is_none() {
                return Err(Error::MissingColumn {
                    path: source.source_path().to_path_buf(),
                    column: column.to_string(),
                });
            }
        }

        let (mut table, start) = prepare(fresh, store, options)?;
        let total = table.len();
        info!(start, total, "labeling {}", kind.display_name());

        let mut processed = 0;
        let mut flushes = 0;
        for idx in start..total {
            let text = table.combined_text(idx, kind);
            let label = self.classifier.classify(Some(&text)).await;
            table.set_label(idx, label);
            processed += 1;

            // Only rows that already carry their label go into a periodic checkpoint, so a
            // resume restarts right after the last one.
            if (idx + 1) % self.batch_size == 0 {
                store.save(&table.prefix(idx + 1))?;
                flushes += 1;
                info!(done = idx + 1, total, "checkpoint saved");
            }
        }

        store.save(&table)?;
        flushes += 1;

        let summary = LabelSummary::from_table(&table);
        info_time!(
            start_time,
            "finished {}: {} rows, buy {}, neutral {}, sell {} -> {}",
            kind.display_name(),
            summary.total(),
            summary.buy,
            summary.neutral,
            summary.sell,
            store.location().display()
        );

        Ok(RunReport {
            start_index: start,
            processed,
            flushes,
            summary,
        })
    }
}

/// Builds the working table and the first row to label.
fn prepare<Ck>(
    fresh: RecordTable,
    store: &Ck,
    options: RunOptions,
) -> Result<(RecordTable, usize)>
where
    Ck: CheckpointStore + ?Sized,
{
    if let Some(start) = options.start_index {
        let start = start.min(fresh.len());
        return Ok((fresh, start));
    }

    if !store.exists() {
        return Ok((fresh, 0));
    }

    if !options.resume {
        warn!(
            path = %store.location().display(),
            "existing checkpoint will be overwritten, pass --resume to continue it"
        );
        return Ok((fresh, 0));
    }

    let Some(checkpoint) = store.load_existing()? else {
        return Ok((fresh, 0));
    };
    if checkpoint.headers() != fresh.headers() {
        return Err(Error::CheckpointMismatch {
            path: store.location().to_path_buf(),
            expected: fresh.headers().to_vec(),
            found: checkpoint.headers().to_vec(),
        });
    }

    let start = checkpoint.len();
    info!(
        rows = start,
        path = %store.location().display(),
        "resuming from checkpoint"
    );
    Ok((checkpoint.resume_with(fresh), start))
}
