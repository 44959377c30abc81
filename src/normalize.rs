use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::NormalizeOptions;
use crate::formats::{BookRecord, NormalizedRecord};

/// Cleans the full harvested set: drop untitled, dedupe by `(title, author)`
/// keeping the first, impute missing review counts, derive the
/// ratings-per-review ratio, sort by ratings count (absent last).
pub fn normalize(records: &[BookRecord], options: &NormalizeOptions) -> Vec<NormalizedRecord> {
    let titled: Vec<&BookRecord> = records
        .iter()
        .filter(|record| !record.title.trim().is_empty())
        .collect();
    let dropped = records.len() - titled.len();

    let mut seen: HashSet<(&str, Option<&str>)> = HashSet::new();
    let unique: Vec<&BookRecord> = titled
        .into_iter()
        .filter(|record| seen.insert((record.title.as_str(), record.author.as_deref())))
        .collect();
    let duplicates = records.len() - dropped - unique.len();

    let mut normalized: Vec<NormalizedRecord> = unique
        .into_iter()
        .map(|record| normalize_one(record, options))
        .collect();

    // Stable, so equal counts keep harvest order.
    normalized.sort_by(|a, b| compare_counts_desc(a.ratings_count, b.ratings_count));

    tracing::info!(
        input = records.len(),
        dropped_untitled = dropped,
        duplicates,
        output = normalized.len(),
        "records normalized"
    );
    normalized
}

fn normalize_one(record: &BookRecord, options: &NormalizeOptions) -> NormalizedRecord {
    let reviews_count = record
        .reviews_count
        .or_else(|| impute_reviews(record.ratings_count, options.review_rate));
    let rating_to_review_ratio = match (record.ratings_count, reviews_count) {
        (Some(ratings), Some(reviews)) => Some(ratings as f64 / (reviews as f64 + 1.0)),
        _ => None,
    };

    NormalizedRecord {
        title: record.title.clone(),
        author: record.author.clone(),
        average_rating: record.average_rating.filter(|rating| rating.is_finite()),
        ratings_count: record.ratings_count,
        reviews_count,
        source_url: record.source_url.clone(),
        rating_to_review_ratio: rating_to_review_ratio.filter(|ratio| ratio.is_finite()),
    }
}

fn impute_reviews(ratings_count: Option<u64>, rate: f64) -> Option<u64> {
    let estimate = (ratings_count? as f64 * rate).round();
    if estimate.is_finite() && estimate >= 0.0 {
        Some(estimate as u64)
    } else {
        None
    }
}

fn compare_counts_desc(a: Option<u64>, b: Option<u64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
