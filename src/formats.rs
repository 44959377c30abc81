use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One book harvested from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub ratings_count: Option<u64>,
    #[serde(default)]
    pub reviews_count: Option<u64>,
    #[serde(default, alias = "book_url")]
    pub source_url: Option<String>,
}

impl BookRecord {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
            average_rating: None,
            ratings_count: None,
            reviews_count: None,
            source_url: None,
        }
    }
}

/// A record after normalization, carrying the derived ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub title: String,
    pub author: Option<String>,
    pub average_rating: Option<f64>,
    pub ratings_count: Option<u64>,
    pub reviews_count: Option<u64>,
    pub source_url: Option<String>,
    pub rating_to_review_ratio: Option<f64>,
}

/// On-disk checkpoint layout, one file per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointFile {
    #[serde(alias = "books")]
    pub records: Vec<BookRecord>,
    pub current_page: usize,
    pub list_url: String,
    pub timestamp: f64,
    pub total_books: usize,
}

/// Same file, read without materializing the records.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointHeader {
    #[serde(default)]
    pub current_page: usize,
    #[serde(default)]
    pub list_url: Option<String>,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub total_books: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointState {
    pub records: Vec<BookRecord>,
    pub page_count: usize,
    pub source_url: String,
    pub session_id: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointSummary {
    pub session_id: String,
    pub total_books: usize,
    pub page_count: usize,
    pub source_url: String,
    pub saved_at: DateTime<Utc>,
}

pub fn timestamp_to_datetime(timestamp: f64) -> DateTime<Utc> {
    if !timestamp.is_finite() || timestamp < 0.0 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    let secs = timestamp.trunc() as i64;
    let nanos = ((timestamp - timestamp.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn datetime_to_timestamp(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / 1e9
}
