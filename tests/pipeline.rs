//! End-to-end labeling runs against CSV files on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sentiscrap::classifier::Classifier;
use sentiscrap::config::ClassifierConfig;
use sentiscrap::rate_limit::Unlimited;
use sentiscrap::record::{Label, RecordKind, RecordTable};
use sentiscrap::runner::{BatchRunner, RunOptions, RunReport};
use sentiscrap::scorer::Scorer;
use sentiscrap::table::{read_table, CheckpointStore, CsvTable};
use sentiscrap::{Error, Result};
use tempfile::TempDir;

/// Answers by keyword so every run sees the same labels.
struct Keyword {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Scorer for Keyword {
    async fn score(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = user.split("Text to analyse:").nth(1).unwrap_or(user);
        Ok(if text.contains("moon") {
            "1".into()
        } else if text.contains("crash") {
            "-1".into()
        } else {
            "0".into()
        })
    }
}

/// Never gives a usable answer.
struct Mumbles {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Scorer for Mumbles {
    async fn score(&self, _system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("I cannot say.".into())
    }
}

/// Real CSV checkpoint that also records what each flush looked like.
struct Recording {
    inner: CsvTable,
    calls: Arc<AtomicUsize>,
    /// (scorer calls so far, rows in the file after the flush)
    flushes: Vec<(usize, usize)>,
    fail_on: Option<usize>,
}

impl Recording {
    fn new(path: PathBuf, calls: Arc<AtomicUsize>) -> Self {
        Self {
            inner: CsvTable::new(path),
            calls,
            flushes: Vec::new(),
            fail_on: None,
        }
    }
}

impl CheckpointStore for Recording {
    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn load_existing(&self) -> Result<Option<RecordTable>> {
        self.inner.load_existing()
    }

    fn save(&mut self, table: &RecordTable) -> Result<()> {
        if self.fail_on == Some(self.flushes.len() + 1) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save(table)?;
        let rows = read_table(self.inner.path())?.len();
        self.flushes.push((self.calls.load(Ordering::SeqCst), rows));
        Ok(())
    }

    fn location(&self) -> &Path {
        self.inner.location()
    }
}

fn comment_text(i: usize) -> &'static str {
    match i % 3 {
        0 => "going to the moon soon",
        1 => "this will crash hard",
        _ => "no idea what happens",
    }
}

fn write_comments(path: &Path, n: usize) {
    let mut out = String::from("id,reply_id,reply_content,date\n");
    for i in 0..n {
        out.push_str(&format!(
            "{},user{},\"{}\",2025-11-17 10:{:02}\n",
            1000 + i,
            i,
            comment_text(i),
            i % 60
        ));
    }
    fs::write(path, out).unwrap();
}

fn config() -> ClassifierConfig {
    ClassifierConfig {
        parse_retry_delay_ms: 0,
        error_retry_delay_ms: 0,
        ..ClassifierConfig::default()
    }
}

fn keyword_runner(batch_size: usize) -> (BatchRunner<Keyword, Unlimited>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let scorer = Keyword {
        calls: calls.clone(),
    };
    let runner =
        BatchRunner::new(Classifier::new(scorer, Unlimited, &config()), batch_size).unwrap();
    (runner, calls)
}

fn comments(resume: bool) -> RunOptions {
    RunOptions {
        kind: RecordKind::Comment,
        start_index: None,
        resume,
    }
}

async fn label(
    input: &Path,
    store: &mut Recording,
    runner: &BatchRunner<Keyword, Unlimited>,
    resume: bool,
) -> RunReport {
    runner
        .run(&CsvTable::new(input), store, comments(resume))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_twenty_five_rows_flush_three_times() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    let output = dir.path().join("reply_labeled.csv");
    write_comments(&input, 25);

    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(output.clone(), calls.clone());
    let report = label(&input, &mut store, &runner, false).await;

    assert_eq!(report.start_index, 0);
    assert_eq!(report.processed, 25);
    assert_eq!(report.flushes, 3);
    assert_eq!(store.flushes, vec![(10, 10), (20, 20), (25, 25)]);
    assert_eq!(report.summary.total(), 25);
    assert_eq!(report.summary.buy, 9);
    assert_eq!(report.summary.sell, 8);
    assert_eq!(report.summary.neutral, 8);

    let labeled = read_table(&output).unwrap();
    assert_eq!(labeled.headers(), ["id", "reply_id", "reply_content", "date"]);
    assert_eq!(labeled.label(0), Label::Buy);
    assert_eq!(labeled.label(1), Label::Sell);
    assert_eq!(labeled.label(2), Label::Neutral);

    let raw = fs::read_to_string(&output).unwrap();
    assert!(raw.starts_with("id,reply_id,reply_content,date,label\n"));
}

#[tokio::test]
async fn test_resume_from_twelve_row_checkpoint() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    let output = dir.path().join("reply_labeled.csv");

    // An earlier run that stopped after twelve rows.
    write_comments(&input, 12);
    let (first, calls) = keyword_runner(10);
    let mut store = Recording::new(output.clone(), calls);
    label(&input, &mut store, &first, false).await;
    let checkpoint = read_table(&output).unwrap();
    assert_eq!(checkpoint.len(), 12);

    write_comments(&input, 25);
    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(output.clone(), calls.clone());
    let report = label(&input, &mut store, &runner, true).await;

    assert_eq!(report.start_index, 12);
    assert_eq!(report.processed, 13);
    assert_eq!(calls.load(Ordering::SeqCst), 13);
    assert_eq!(report.flushes, 2);
    // Flush after row 20 (8 new rows labeled), then the final one after row 25.
    assert_eq!(store.flushes, vec![(8, 20), (13, 25)]);

    let labeled = read_table(&output).unwrap();
    assert_eq!(&labeled.rows()[..12], checkpoint.rows());
}

#[tokio::test]
async fn test_interrupted_then_resumed_equals_one_run() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    write_comments(&input, 25);

    let (runner, calls) = keyword_runner(10);
    let mut once = Recording::new(dir.path().join("once.csv"), calls);
    label(&input, &mut once, &runner, false).await;

    // Killed at the flush after row 20: only the first ten labels made it to disk.
    let (runner, calls) = keyword_runner(10);
    let mut twice = Recording::new(dir.path().join("twice.csv"), calls.clone());
    twice.fail_on = Some(2);
    runner
        .run(&CsvTable::new(&input), &mut twice, comments(false))
        .await
        .unwrap_err();
    assert_eq!(read_table(&dir.path().join("twice.csv")).unwrap().len(), 10);

    let (runner, calls) = keyword_runner(10);
    let mut twice = Recording::new(dir.path().join("twice.csv"), calls.clone());
    let report = label(&input, &mut twice, &runner, true).await;
    assert_eq!(report.start_index, 10);
    assert_eq!(report.processed, 15);
    assert_eq!(calls.load(Ordering::SeqCst), 15);

    assert_eq!(
        read_table(&dir.path().join("once.csv")).unwrap(),
        read_table(&dir.path().join("twice.csv")).unwrap()
    );
}

#[tokio::test]
async fn test_checkpoint_grows_with_each_flush() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    write_comments(&input, 17);

    let (runner, calls) = keyword_runner(3);
    let mut store = Recording::new(dir.path().join("out.csv"), calls);
    label(&input, &mut store, &runner, false).await;

    let lengths: Vec<usize> = store.flushes.iter().map(|&(_, rows)| rows).collect();
    assert_eq!(lengths, vec![3, 6, 9, 12, 15, 17]);
}

#[tokio::test]
async fn test_declining_resume_relabels_everything() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    let output = dir.path().join("reply_labeled.csv");
    write_comments(&input, 5);

    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(output.clone(), calls.clone());
    label(&input, &mut store, &runner, false).await;
    let report = label(&input, &mut store, &runner, false).await;

    assert_eq!(report.start_index, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(read_table(&output).unwrap().len(), 5);
}

#[tokio::test]
async fn test_unparsable_answers_cost_exactly_the_attempt_cap() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    write_comments(&input, 4);

    let calls = Arc::new(AtomicUsize::new(0));
    let scorer = Mumbles {
        calls: calls.clone(),
    };
    let runner = BatchRunner::new(Classifier::new(scorer, Unlimited, &config()), 10).unwrap();
    let mut store = CsvTable::new(dir.path().join("out.csv"));
    let report = runner
        .run(&CsvTable::new(&input), &mut store, comments(false))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 4 * 3);
    assert_eq!(report.summary.neutral, 4);
}

#[tokio::test]
async fn test_empty_comments_never_reach_the_model() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    fs::write(
        &input,
        "id,reply_id,reply_content,date\n1,a,,d\n2,b,   ,d\n3,c,ㅋㅋ,d\n4,d,to the moon,d\n",
    )
    .unwrap();

    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(dir.path().join("out.csv"), calls.clone());
    let report = label(&input, &mut store, &runner, false).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.summary.buy, 1);
    assert_eq!(report.summary.neutral, 3);
}

#[tokio::test]
async fn test_failed_flush_aborts_and_keeps_last_checkpoint() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("reply.csv");
    let output = dir.path().join("reply_labeled.csv");
    write_comments(&input, 25);

    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(output.clone(), calls.clone());
    store.fail_on = Some(2);

    let err = runner
        .run(&CsvTable::new(&input), &mut store, comments(false))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    // Stopped at the failing flush after row 20.
    assert_eq!(calls.load(Ordering::SeqCst), 20);

    // Only the rows labeled before the last good flush are on disk.
    let checkpoint = read_table(&output).unwrap();
    assert_eq!(checkpoint.len(), 10);
    assert_eq!(checkpoint.label(0), Label::Buy);
    assert_eq!(checkpoint.label(9), Label::Buy);
    assert_eq!(
        fs::read_dir(dir.path()).unwrap().count(),
        2,
        "no temp files left behind"
    );
}

#[tokio::test]
async fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let (runner, calls) = keyword_runner(10);
    let mut store = Recording::new(dir.path().join("out.csv"), calls);

    let result = runner
        .run(
            &CsvTable::new(dir.path().join("missing.csv")),
            &mut store,
            comments(false),
        )
        .await;
    assert!(result.is_err());
    assert!(!dir.path().join("out.csv").exists());
}
