//! Data models for collected posts.
//!
//! [`FeedPost`] mirrors the raw timeline payload; [`PostRecord`] is the
//! normalized row written to the archive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One normalized post, the row unit of every sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub timestamp: DateTime<Utc>,
    pub body: String,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,
    pub language: Option<String>,
    pub is_repost: bool,
    pub repost_count: u64,
}

impl PostRecord {
    /// Key used to drop duplicate rows when merging.
    #[must_use]
    pub fn dedup_key(&self) -> (DateTime<Utc>, String) {
        (self.timestamp, self.body.clone())
    }
}

/// Whether a post body marks a repost.
#[must_use]
pub fn is_repost_text(body: &str) -> bool {
    body.starts_with("RT ")
}

/// Posts collected for one account in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostTable {
    account: String,
    records: Vec<PostRecord>,
}

impl PostTable {
    pub fn new(account: impl Into<String>, records: Vec<PostRecord>) -> Self {
        Self {
            account: account.into(),
            records,
        }
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    #[must_use]
    pub fn records(&self) -> &[PostRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Newest and oldest timestamps in the table.
    #[must_use]
    pub fn span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let newest = self.records.iter().map(|r| r.timestamp).max()?;
        let oldest = self.records.iter().map(|r| r.timestamp).min()?;
        Some((newest, oldest))
    }
}

/// A post as returned by the timeline endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedPost {
    pub id: u64,
    #[serde(deserialize_with = "deserialize_feed_date")]
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub entities: Entities,
}

/// Entity blocks attached to a post.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<HashtagEntity>,
    #[serde(default)]
    pub user_mentions: Vec<MentionEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HashtagEntity {
    #[serde(default)]
    pub text: LooseText,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentionEntity {
    #[serde(default)]
    pub screen_name: LooseText,
}

/// A field that is expected to hold text but may hold anything.
///
/// Non-string JSON values (numbers, nulls, objects) deserialize to `None`
/// instead of failing the whole page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LooseText(Option<String>);

impl LooseText {
    pub fn text(value: impl Into<String>) -> Self {
        Self(Some(value.into()))
    }

    #[must_use]
    pub const fn missing() -> Self {
        Self(None)
    }

    /// The text, or `""` when the value was not textual.
    #[must_use]
    pub fn as_str_or_empty(&self) -> &str {
        self.0.as_deref().unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for LooseText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(s) => Self(Some(s)),
            _ => Self(None),
        })
    }
}

/// Timeline date format: "Wed Oct 10 20:19:24 +0000 2018"
pub const FEED_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a timeline date, falling back to RFC 3339.
#[must_use]
pub fn parse_feed_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, FEED_DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn deserialize_feed_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_feed_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid created_at '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn feed_post_parses_timeline_payload() {
        let json = r#"{
            "id": 1239000000000000001,
            "created_at": "Sun Mar 15 10:30:00 +0000 2020",
            "text": "RT @rail: delays on #RE1",
            "lang": "de",
            "retweet_count": 4,
            "entities": {
                "hashtags": [{"text": "RE1", "indices": [18, 22]}],
                "user_mentions": [{"screen_name": "rail", "id": 1}]
            }
        }"#;
        let post: FeedPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.id, 1_239_000_000_000_000_001);
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2020, 3, 15, 10, 30, 0).unwrap()
        );
        assert_eq!(post.lang.as_deref(), Some("de"));
        assert_eq!(post.entities.hashtags[0].text.as_str_or_empty(), "RE1");
        assert_eq!(post.entities.user_mentions[0].screen_name.as_str_or_empty(), "rail");
    }

    #[test]
    fn loose_text_tolerates_non_string_values() {
        let json = r#"{"hashtags": [{"text": 42}, {"text": null}, {}], "user_mentions": [{"screen_name": {"x": 1}}]}"#;
        let entities: Entities = serde_json::from_str(json).unwrap();
        assert_eq!(entities.hashtags.len(), 3);
        assert!(entities.hashtags.iter().all(|h| h.text.as_str_or_empty().is_empty()));
        assert_eq!(entities.user_mentions[0].screen_name, LooseText::missing());
    }

    #[test]
    fn missing_optional_fields_default() {
        let json = r#"{"id": 7, "created_at": "2020-03-15T10:30:00Z", "text": "hi"}"#;
        let post: FeedPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.retweet_count, 0);
        assert!(post.lang.is_none());
        assert!(post.entities.hashtags.is_empty());
    }

    #[test]
    fn bad_created_at_is_rejected() {
        let json = r#"{"id": 7, "created_at": "yesterday", "text": "hi"}"#;
        assert!(serde_json::from_str::<FeedPost>(json).is_err());
    }

    #[test]
    fn repost_detection_is_textual() {
        assert!(is_repost_text("RT @someone: hello"));
        assert!(!is_repost_text("RTX launch"));
        assert!(!is_repost_text("rt lowercase"));
        assert!(!is_repost_text(""));
    }

    #[test]
    fn table_span_reports_newest_and_oldest() {
        let at = |d| Utc.with_ymd_and_hms(2020, 3, d, 0, 0, 0).unwrap();
        let record = |d| PostRecord {
            timestamp: at(d),
            body: format!("post {d}"),
            hashtags: vec![],
            mentions: vec![],
            language: None,
            is_repost: false,
            repost_count: 0,
        };
        let table = PostTable::new("@a", vec![record(20), record(15), record(17)]);
        assert_eq!(table.span(), Some((at(20), at(15))));
        assert!(PostTable::new("@a", vec![]).span().is_none());
    }
}
