//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use sentiscrap::classifier::Classifier;
use sentiscrap::config::Config;
use sentiscrap::crawl::crawl_board;
use sentiscrap::rate_limit::FixedInterval;
use sentiscrap::record::RecordKind;
use sentiscrap::runner::{BatchRunner, RunOptions};
use sentiscrap::scorer::OpenAiScorer;
use sentiscrap::table::{CheckpointStore, CsvTable};
use sentiscrap::{Error, Result};

#[derive(Parser)]
#[command(name = "sentiscrap")]
#[command(about = "Scrape a stock board and label post/comment sentiment with an LLM")]
#[command(version)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Label posts and/or comments, flushing progress as it goes
    Label(LabelArgs),

    /// Collect posts and comments from the board into the data directory
    Crawl {
        /// First list page (overrides config)
        #[arg(long)]
        start_page: Option<u32>,
        /// Last list page, inclusive (overrides config)
        #[arg(long)]
        end_page: Option<u32>,
        /// Pages crawled concurrently (overrides config)
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

#[derive(Args)]
struct LabelArgs {
    /// Which table to label
    #[arg(short, long, value_enum, default_value = "both")]
    kind: KindArg,
    /// Input CSV (single kind only; default: <data_dir>/contents.csv or reply.csv)
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output CSV (single kind only; default: <data_dir>/*_labeled.csv)
    #[arg(long)]
    output: Option<PathBuf>,
    /// Rows between checkpoint flushes (overrides config)
    #[arg(short, long)]
    batch_size: Option<usize>,
    /// Start at this row and ignore any existing checkpoint
    #[arg(long)]
    start_index: Option<usize>,
    /// Continue an existing checkpoint instead of overwriting it
    #[arg(short, long)]
    resume: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Posts,
    Comments,
    Both,
}

impl KindArg {
    fn kinds(self) -> &'static [RecordKind] {
        match self {
            KindArg::Posts => &[RecordKind::Post],
            KindArg::Comments => &[RecordKind::Comment],
            KindArg::Both => &[RecordKind::Post, RecordKind::Comment],
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Label(args) => cmd_label(&config, args).await,
        Commands::Crawl {
            start_page,
            end_page,
            workers,
        } => {
            let crawler = &mut config.crawler;
            if let Some(n) = start_page {
                crawler.start_page = n;
            }
            if let Some(n) = end_page {
                crawler.end_page = n;
            }
            if let Some(n) = workers {
                crawler.workers = n;
            }
            config.validate()?;

            let summary = crawl_board(&config.crawler, &config.runner.data_dir).await?;
            println!(
                "Collected {} posts and {} comments ({} / {} stored)",
                summary.new_posts, summary.new_replies, summary.total_posts, summary.total_replies
            );
            Ok(())
        }
    }
}

async fn cmd_label(config: &Config, args: LabelArgs) -> Result<()> {
    let kinds = args.kind.kinds();
    if kinds.len() > 1 && (args.input.is_some() || args.output.is_some()) {
        return Err(Error::InvalidConfig(
            "--input/--output need --kind posts or --kind comments".into(),
        ));
    }

    let batch_size = args.batch_size.unwrap_or(config.runner.batch_size);
    let scorer = OpenAiScorer::new(&config.classifier)?;
    let limiter = FixedInterval::new(config.runner.throttle());
    let classifier = Classifier::new(scorer, limiter, &config.classifier);
    let runner = BatchRunner::new(classifier, batch_size)?;

    let data_dir = &config.runner.data_dir;
    for &kind in kinds {
        let source = CsvTable::new(
            args.input
                .clone()
                .unwrap_or_else(|| data_dir.join(kind.input_file())),
        );
        let mut store = CsvTable::new(
            args.output
                .clone()
                .unwrap_or_else(|| data_dir.join(kind.output_file())),
        );
        let options = RunOptions {
            kind,
            start_index: args.start_index,
            resume: args.resume,
        };

        let report = runner.run(&source, &mut store, options).await?;
        println!(
            "{} labeling done ({} rows labeled this run)",
            kind.display_name(),
            report.processed
        );
        println!("{}", report.summary);
        println!("Saved to: {}", store.location().display());
    }
    Ok(())
}
