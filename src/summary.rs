use std::fmt;

use crate::formats::NormalizedRecord;

const TOP_RECORDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub mean_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub most_rated: Option<String>,
    pub most_reviewed: Option<String>,
    /// `(title, ratings_count)`, highest first.
    pub top: Vec<(String, u64)>,
}

impl Summary {
    pub fn from_records(records: &[NormalizedRecord]) -> Self {
        let ratings: Vec<f64> = records
            .iter()
            .filter_map(|record| record.average_rating)
            .collect();
        let mean_rating =
            (!ratings.is_empty()).then(|| ratings.iter().sum::<f64>() / ratings.len() as f64);
        let max_rating = ratings.iter().copied().reduce(f64::max);

        let most_rated = first_max_by(records, |record| record.ratings_count);
        let most_reviewed = first_max_by(records, |record| record.reviews_count);

        let mut top: Vec<(String, u64)> = records
            .iter()
            .filter_map(|record| Some((record.title.clone(), record.ratings_count?)))
            .collect();
        top.sort_by(|a, b| b.1.cmp(&a.1));
        top.truncate(TOP_RECORDS);

        Self {
            total: records.len(),
            mean_rating,
            max_rating,
            most_rated,
            most_reviewed,
            top,
        }
    }
}

/// Title of the first record holding the largest value.
fn first_max_by(
    records: &[NormalizedRecord],
    key: impl Fn(&NormalizedRecord) -> Option<u64>,
) -> Option<String> {
    let mut best: Option<(u64, &str)> = None;
    for record in records {
        let Some(value) = key(record) else {
            continue;
        };
        if best.is_none_or(|(current, _)| value > current) {
            best = Some((value, &record.title));
        }
    }
    best.map(|(_, title)| title.to_owned())
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== SUMMARY ===")?;
        writeln!(f, "Total books: {}", self.total)?;
        match self.mean_rating {
            Some(mean) => writeln!(f, "Average rating: {mean:.2}")?,
            None => writeln!(f, "Average rating: n/a")?,
        }
        match self.max_rating {
            Some(max) => writeln!(f, "Highest rating: {max}")?,
            None => writeln!(f, "Highest rating: n/a")?,
        }
        writeln!(
            f,
            "Most rated: {}",
            self.most_rated.as_deref().unwrap_or("n/a")
        )?;
        writeln!(
            f,
            "Most reviewed: {}",
            self.most_reviewed.as_deref().unwrap_or("n/a")
        )?;
        if !self.top.is_empty() {
            writeln!(f, "Top {} by ratings:", self.top.len())?;
            for (rank, (title, count)) in self.top.iter().enumerate() {
                writeln!(f, "  {}. {title} ({count} ratings)", rank + 1)?;
            }
        }
        Ok(())
    }
}
