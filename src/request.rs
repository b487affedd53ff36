use std::ops::RangeInclusive;
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::CrawlerConfig;
use crate::crawl::{harvest_page, PageContext, PageHarvest};
use crate::{info_time, Result};

/// Builds the one client every crawl task shares.
pub(crate) fn build_client(config: &CrawlerConfig) -> Result<Client> {
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()?;
    Ok(client)
}

/// Returns a `JoinSet` with one task per list page, so that they can be awaited.
/// At most `workers` pages are in flight at once.
pub(crate) fn request_pages(
    pages: RangeInclusive<u32>,
    workers: usize,
    ctx: Arc<PageContext>,
) -> JoinSet<(u32, PageHarvest)> {
    info_time!("Requesting pages {}..={}", pages.start(), pages.end());

    let permits = Arc::new(Semaphore::new(workers));
    let mut task_set = JoinSet::new();
    for page_num in pages {
        task_set.spawn({
            // Context (and the client inside it) sits behind an Arc, cheap to clone.
            let ctx = ctx.clone();
            let permits = permits.clone();

            async move {
                // The semaphore is never closed.
                let _permit = permits.acquire_owned().await.ok();
                (page_num, harvest_page(&ctx, page_num).await)
            }
        });
    }
    task_set
}

/// Requests a page and returns a `Result<String>` containing the HTML.
pub(crate) async fn request_page_html(client: &Client, url: &str) -> Result<String> {
    let res = client.get(url).send().await?.error_for_status()?;
    let html = res.text().await?;
    Ok(html)
}
