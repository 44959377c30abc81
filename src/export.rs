use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context as _;

use crate::formats::NormalizedRecord;

/// Fails when `out` exists and `force` is not set; creates the parent dir.
pub fn ensure_output_writable(out: &Path, force: bool) -> anyhow::Result<()> {
    if out.exists() && !force {
        anyhow::bail!(
            "output already exists (use --force to overwrite): {}",
            out.display()
        );
    }
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }
    Ok(())
}

/// One header row, then one row per record; absent values are empty cells.
pub fn write_csv(out: &Path, records: &[NormalizedRecord], force: bool) -> anyhow::Result<()> {
    ensure_output_writable(out, force)?;

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let file = options
        .open(out)
        .with_context(|| format!("open output: {}", out.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(file);
    if records.is_empty() {
        writer
            .write_record(COLUMNS)
            .with_context(|| format!("write header: {}", out.display()))?;
    }
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("write row: {}", out.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush output: {}", out.display()))?;

    tracing::info!(rows = records.len(), out = %out.display(), "csv written");
    Ok(())
}

const COLUMNS: [&str; 7] = [
    "title",
    "author",
    "average_rating",
    "ratings_count",
    "reviews_count",
    "source_url",
    "rating_to_review_ratio",
];
