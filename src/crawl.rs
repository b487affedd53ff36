//! Board crawler: collects posts and comments inside a date window.
//!
//! Every list page is handled by its own task with its own accumulation; results are only
//! merged once every page task has finished. The merged rows are appended to the existing
//! `contents.csv` / `reply.csv`, de-duplicated and written atomically.

use std::collections::HashSet;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tracing::{debug, warn};

use crate::config::CrawlerConfig;
use crate::parse::{parse_article, parse_list_page};
use crate::record::RecordKind;
use crate::request::{build_client, request_page_html, request_pages};
use crate::table::atomic_write;
use crate::{info_time, Result};

/// One row of `contents.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub date: String,
}

impl Post {
    const COLUMNS: [&'static str; 4] = ["id", "title", "content", "date"];
}

/// One row of `reply.csv`. `id` is the id of the post the comment belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reply {
    pub id: String,
    pub reply_id: String,
    pub reply_content: String,
    pub date: String,
}

impl Reply {
    const COLUMNS: [&'static str; 4] = ["id", "reply_id", "reply_content", "date"];
}

/// Everything collected from one list page.
#[derive(Debug, Default)]
pub(crate) struct PageHarvest {
    pub posts: Vec<Post>,
    pub replies: Vec<Reply>,
}

/// Shared, read-only state of a crawl.
pub(crate) struct PageContext {
    pub client: Client,
    pub config: CrawlerConfig,
    pub window: (NaiveDateTime, NaiveDateTime),
    pub today: NaiveDate,
}

/// Totals of a finished crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSummary {
    pub new_posts: usize,
    pub new_replies: usize,
    pub total_posts: usize,
    pub total_replies: usize,
}

/// Crawls `config.start_page..=config.end_page` and updates the tables in `data_dir`.
pub async fn crawl_board(config: &CrawlerConfig, data_dir: &Path) -> Result<CrawlSummary> {
    let start_time = Local::now();
    let window = config.window()?;
    info_time!(
        "Crawling {} pages {}..={} for posts between {} and {} with {} workers",
        config.gallery_id,
        config.start_page,
        config.end_page,
        window.0,
        window.1,
        config.workers
    );

    let ctx = Arc::new(PageContext {
        client: build_client(config)?,
        config: config.clone(),
        window,
        today: Local::now().date_naive(),
    });

    let mut task_set = request_pages(config.start_page..=config.end_page, config.workers, ctx);
    let mut harvests = Vec::new();
    while let Some(task) = task_set.join_next().await {
        harvests.push(task?);
    }
    // Keep page order regardless of which task finished first.
    harvests.sort_unstable_by_key(|(page, _)| *page);

    let mut posts = Vec::new();
    let mut replies = Vec::new();
    for (_, harvest) in harvests {
        posts.extend(harvest.posts);
        replies.extend(harvest.replies);
    }
    let new_posts = posts.len();
    let new_replies = replies.len();

    let posts_path = data_dir.join(RecordKind::Post.input_file());
    let replies_path = data_dir.join(RecordKind::Comment.input_file());
    let total_posts = merge_into(&posts_path, posts, &Post::COLUMNS)?;
    let total_replies = merge_into(&replies_path, replies, &Reply::COLUMNS)?;

    info_time!(
        start_time,
        "Crawl done: {} posts / {} comments collected, {} / {} stored in {}",
        new_posts,
        new_replies,
        total_posts,
        total_replies,
        data_dir.display()
    );

    Ok(CrawlSummary {
        new_posts,
        new_replies,
        total_posts,
        total_replies,
    })
}

/// Crawls one list page and every article on it that falls inside the window.
/// Fetch failures are logged and skipped.
pub(crate) async fn harvest_page(ctx: &PageContext, page_num: u32) -> PageHarvest {
    let mut harvest = PageHarvest::default();
    let config = &ctx.config;

    let html = match request_page_html(&ctx.client, &config.list_url(page_num)).await {
        Ok(html) => html,
        Err(e) => {
            warn!(page = page_num, error = %e, "failed to load list page");
            return harvest;
        }
    };
    tokio::time::sleep(config.page_delay()).await;

    let (window, today) = (ctx.window, ctx.today);
    let entries = match spawn_blocking(move || parse_list_page(&html, window, today)).await {
        Ok(Ok(entries)) => entries,
        Ok(Err(e)) => {
            warn!(page = page_num, error = %e, "failed to parse list page");
            return harvest;
        }
        Err(e) => {
            warn!(page = page_num, error = %e, "list page parser panicked");
            return harvest;
        }
    };
    if entries.is_empty() {
        debug!(page = page_num, "nothing to collect");
        return harvest;
    }

    for entry in entries {
        let url = format!("{}{}", config.site_origin, entry.href);
        let article = match request_page_html(&ctx.client, &url).await {
            Ok(html) => spawn_blocking(move || parse_article(&html)).await,
            Err(e) => {
                warn!(page = page_num, post = %entry.id, error = %e, "failed to load article");
                continue;
            }
        };
        tokio::time::sleep(config.page_delay()).await;

        let article = match article {
            Ok(Ok(article)) => article,
            Ok(Err(e)) => {
                warn!(page = page_num, post = %entry.id, error = %e, "failed to parse article");
                continue;
            }
            Err(e) => {
                warn!(page = page_num, post = %entry.id, error = %e, "article parser panicked");
                continue;
            }
        };

        debug!(
            page = page_num,
            post = %entry.id,
            title = %entry.title,
            date = %entry.date,
            "collected"
        );
        harvest
            .replies
            .extend(article.replies.into_iter().map(|r| Reply {
                id: entry.id.clone(),
                reply_id: r.author,
                reply_content: r.text,
                date: r.date,
            }));
        harvest.posts.push(Post {
            id: entry.id,
            title: entry.title,
            content: article.content,
            date: entry.date,
        });
    }

    info_time!(
        "Page {} done ({} posts, {} comments)",
        page_num,
        harvest.posts.len(),
        harvest.replies.len()
    );
    harvest
}

/// Appends `rows` to the table at `path`, drops duplicates and rewrites it.
/// Returns the stored row count.
fn merge_into<T>(path: &Path, rows: Vec<T>, columns: &[&str]) -> Result<usize>
where
    T: Serialize + DeserializeOwned + Eq + Hash + Clone,
{
    let mut all: Vec<T> = if path.exists() {
        let mut reader = csv::Reader::from_path(path)?;
        reader.deserialize().collect::<csv::Result<_>>()?
    } else {
        Vec::new()
    };
    all.extend(rows);

    let kept = dedup_keep_last(all);
    atomic_write(path, |file| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        // Written by hand so an empty table still has its header.
        writer.write_record(columns)?;
        for row in &kept {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })?;
    Ok(kept.len())
}

/// Drops repeated rows, keeping each row's last occurrence in its position.
fn dedup_keep_last<T: Eq + Hash + Clone>(rows: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(rows.len());
    let mut kept: Vec<T> = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert(row.clone()))
        .collect();
    kept.reverse();
    kept
}
