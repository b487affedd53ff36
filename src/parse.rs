use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use scraper::{ElementRef, Html, Selector};

use crate::{Error, Result};

/// Row kinds on the list page that are never collected: survey, ad, notice.
const SKIPPED_HEADS: [&str; 3] = ["설문", "AD", "공지"];

/// A post row from a board list page that falls inside the crawl window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListEntry {
    pub id: String,
    pub title: String,
    pub href: String,
    pub date: String,
}

/// Body text and comments of one article page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ArticlePage {
    pub content: String,
    pub replies: Vec<ReplyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReplyEntry {
    pub author: String,
    pub date: String,
    pub text: String,
}

/// Parses a list page, keeping the post rows dated inside `window` (inclusive).
/// `today` resolves the `HH:MM` dates the board shows for fresh posts.
pub(crate) fn parse_list_page(
    html: &str,
    window: (NaiveDateTime, NaiveDateTime),
    today: NaiveDate,
) -> Result<Vec<ListEntry>> {
    let doc = Html::parse_document(html);

    let row_selector = create_selector("tbody tr")?;
    let date_selector = create_selector("td.gall_date")?;
    let link_selector = create_selector("a")?;
    let head_selector = create_selector("td.gall_subject")?;
    let num_selector = create_selector("td.gall_num")?;
    let href_selector = create_selector("a[href]")?;

    let mut entries = Vec::new();
    for row in doc.select(&row_selector) {
        let Some((posted_at, date)) = row
            .select(&date_selector)
            .next()
            .and_then(|td| parse_row_date(td, today))
        else {
            continue;
        };
        if posted_at < window.0 || posted_at > window.1 {
            continue;
        }

        let Some(title) = row.select(&link_selector).next().map(text_of) else {
            continue;
        };
        let Some(head) = row.select(&head_selector).next().map(text_of) else {
            continue;
        };
        if SKIPPED_HEADS.contains(&head.as_str()) {
            continue;
        }
        let Some(id) = row.select(&num_selector).next().map(text_of) else {
            continue;
        };
        let Some(href) = row
            .select(&href_selector)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        entries.push(ListEntry {
            id,
            title,
            href: href.to_string(),
            date,
        });
    }
    Ok(entries)
}

/// Parses an article page into its body text and comments.
pub(crate) fn parse_article(html: &str) -> Result<ArticlePage> {
    let doc = Html::parse_document(html);

    let body_selector = create_selector("div.write_div")?;
    let reply_selector = create_selector("li.ub-content")?;
    let author_selector = create_selector("em")?;
    let date_selector = create_selector("span.date_time")?;
    let text_selector = create_selector("p.usertxt.ub-word")?;

    let content = doc
        .select(&body_selector)
        .next()
        .map(|div| div.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let first_text = |li: ElementRef, selector: &Selector| {
        li.select(selector).next().map(text_of).unwrap_or_default()
    };
    let replies = doc
        .select(&reply_selector)
        .map(|li| ReplyEntry {
            author: first_text(li, &author_selector),
            date: first_text(li, &date_selector),
            text: first_text(li, &text_selector),
        })
        .collect();

    Ok(ArticlePage { content, replies })
}

/// Reads the posting time of a list row.
///
/// Older posts carry the full timestamp in the `title` attribute (`2025-11-17 09:41:07`);
/// posts from today only show `HH:MM`.
fn parse_row_date(td: ElementRef, today: NaiveDate) -> Option<(NaiveDateTime, String)> {
    if let Some(title) = td.value().attr("title") {
        let stamp: String = title.chars().take(19).collect();
        let parsed = NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").ok()?;
        return Some((parsed, stamp));
    }

    let shown = text_of(td);
    if !shown.contains(':') {
        return None;
    }
    let time = NaiveTime::parse_from_str(&shown, "%H:%M").ok()?;
    let posted_at = today.and_time(time);
    Some((posted_at, posted_at.format("%Y-%m-%d %H:%M").to_string()))
}

#[inline]
fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
