//! Timeline feed sources.
//!
//! [`FeedSource`] is the seam the collector pages through. [`TwitterFeed`]
//! implements it against the v1.1 `statuses/user_timeline` endpoint with a
//! static bearer token. Requests are never retried.

use crate::config::FeedConfig;
use crate::error::{CrawlError, Result};
use crate::model::FeedPost;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Largest page the timeline endpoint serves.
pub const MAX_PAGE_SIZE: u32 = 200;

const USER_TIMELINE_PATH: &str = "1.1/statuses/user_timeline.json";
const RATE_LIMIT_CODE: i64 = 88;

/// A reverse-chronological, paginated feed of one account's posts.
pub trait FeedSource {
    /// Fetch the newest page for `account`.
    ///
    /// # Errors
    ///
    /// Returns a fetch or rate-limit error when the page cannot be retrieved.
    fn latest_page(&self, account: &str) -> Result<Vec<FeedPost>>;

    /// Fetch the page of posts strictly older than the post with id `cursor`.
    ///
    /// # Errors
    ///
    /// Returns a fetch or rate-limit error when the page cannot be retrieved.
    fn page_before(&self, account: &str, cursor: u64) -> Result<Vec<FeedPost>>;
}

impl<T: FeedSource + ?Sized> FeedSource for &T {
    fn latest_page(&self, account: &str) -> Result<Vec<FeedPost>> {
        (**self).latest_page(account)
    }

    fn page_before(&self, account: &str, cursor: u64) -> Result<Vec<FeedPost>> {
        (**self).page_before(account, cursor)
    }
}

/// Blocking client for the user timeline endpoint.
pub struct TwitterFeed {
    client: Client,
    base_url: String,
    bearer: String,
    page_size: u32,
    include_retweets: bool,
}

impl TwitterFeed {
    /// Set up the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Auth`] when no bearer token is configured or the
    /// client cannot be built. Callers treat this as fatal.
    pub fn connect(config: &FeedConfig) -> Result<Self> {
        let bearer = config
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CrawlError::auth("no bearer token configured"))?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("xcrawl/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CrawlError::auth(format!("failed to build HTTP client: {e}")))?;

        let feed = Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer,
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
            include_retweets: config.include_retweets,
        };
        info!(base_url = %feed.base_url, page_size = feed.page_size, "Feed connection established");
        Ok(feed)
    }

    fn fetch(&self, account: &str, max_id: Option<u64>) -> Result<Vec<FeedPost>> {
        let screen_name = account.trim_start_matches('@');
        let mut query = vec![
            ("screen_name", screen_name.to_string()),
            ("count", self.page_size.to_string()),
            ("include_rts", self.include_retweets.to_string()),
        ];
        if let Some(max_id) = max_id {
            query.push(("max_id", max_id.to_string()));
        }

        let url = format!("{}/{USER_TIMELINE_PATH}", self.base_url);
        debug!(%url, account, ?max_id, "Requesting timeline page");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer)
            .query(&query)
            .send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            return Err(api_error(account, status, &body));
        }

        let page: Vec<FeedPost> = serde_json::from_str(&body)
            .map_err(|e| CrawlError::fetch(account, format!("malformed timeline page: {e}")))?;
        debug!(account, posts = page.len(), "Received timeline page");
        Ok(page)
    }
}

impl FeedSource for TwitterFeed {
    fn latest_page(&self, account: &str) -> Result<Vec<FeedPost>> {
        self.fetch(account, None)
    }

    fn page_before(&self, account: &str, cursor: u64) -> Result<Vec<FeedPost>> {
        // max_id is inclusive on the endpoint
        self.fetch(account, Some(cursor.saturating_sub(1)))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorEntry>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEntry {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode an error response into a tagged error.
fn api_error(account: &str, status: StatusCode, body: &str) -> CrawlError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let first = parsed.errors.into_iter().next();
    let code = first.as_ref().and_then(|e| e.code);
    let message = first
        .and_then(|e| e.message)
        .or(parsed.error)
        .unwrap_or_else(|| format!("HTTP {status}"));

    if status == StatusCode::TOO_MANY_REQUESTS || code == Some(RATE_LIMIT_CODE) {
        CrawlError::RateLimited {
            account: account.to_string(),
            code,
            message,
        }
    } else {
        CrawlError::Fetch {
            account: account.to_string(),
            status: Some(status.as_u16()),
            code,
            message,
        }
    }
}
