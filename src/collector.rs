//! Paginated time-window collection.
//!
//! Walks an account's feed newest-first, keeps the posts strictly inside the
//! window, and stops once a page reaches back to the window start.

use crate::config::{CollectorConfig, EmptyPagePolicy};
use crate::error::{CrawlError, Result};
use crate::feed::FeedSource;
use crate::model::{FeedPost, PostRecord, PostTable, is_repost_text};
use crate::window::DateWindow;
use tracing::{debug, info, warn};

/// Collects one account's posts for a window from a [`FeedSource`].
pub struct Collector<F> {
    feed: F,
    max_pages: usize,
    on_empty_page: EmptyPagePolicy,
}

impl<F: FeedSource> Collector<F> {
    pub fn new(feed: F, config: &CollectorConfig) -> Self {
        Self {
            feed,
            max_pages: config.max_pages,
            on_empty_page: config.on_empty_page,
        }
    }

    #[must_use]
    pub const fn feed(&self) -> &F {
        &self.feed
    }

    /// Collect every post with `start < created_at < end`.
    ///
    /// # Errors
    ///
    /// Propagates feed errors, and returns [`CrawlError::EmptyPage`] when an
    /// empty page is seen under [`EmptyPagePolicy::Fail`].
    pub fn collect(&self, account: &str, window: &DateWindow) -> Result<PostTable> {
        info!(account, %window, "Collecting posts");
        let start = window.start_at();

        let mut records = Vec::new();
        let mut page = self.feed.latest_page(account)?;
        let mut pages_fetched = 1;

        loop {
            let Some(oldest) = page.last() else {
                match self.on_empty_page {
                    EmptyPagePolicy::Stop => {
                        debug!(account, page = pages_fetched, "Empty page, end of feed");
                        break;
                    }
                    EmptyPagePolicy::Fail => {
                        return Err(CrawlError::EmptyPage {
                            account: account.to_string(),
                            page: pages_fetched,
                        });
                    }
                }
            };
            let (cursor, oldest_at) = (oldest.id, oldest.created_at);

            records.extend(
                page.iter()
                    .filter(|post| window.contains(post.created_at))
                    .map(extract_record),
            );

            if oldest_at <= start {
                break;
            }
            if self.max_pages > 0 && pages_fetched >= self.max_pages {
                warn!(
                    account,
                    max_pages = self.max_pages,
                    "Page limit reached before the window start; results may be incomplete"
                );
                break;
            }

            page = self.feed.page_before(account, cursor)?;
            pages_fetched += 1;
        }

        info!(account, posts = records.len(), pages = pages_fetched, "Collection finished");
        Ok(PostTable::new(account, records))
    }
}

/// Normalize one feed post into a sheet row.
#[must_use]
pub fn extract_record(post: &FeedPost) -> PostRecord {
    PostRecord {
        timestamp: post.created_at,
        body: post.text.clone(),
        hashtags: post
            .entities
            .hashtags
            .iter()
            .map(|h| h.text.as_str_or_empty().to_string())
            .collect(),
        mentions: post
            .entities
            .user_mentions
            .iter()
            .map(|m| m.screen_name.as_str_or_empty().to_string())
            .collect(),
        language: post.lang.clone(),
        is_repost: is_repost_text(&post.text),
        repost_count: post.retweet_count,
    }
}
