use std::collections::HashMap;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

mod list_site;

use list_site::{ListSite, listing_page};

const LIST_PATH: &str = "/list/show/7.Fixture_Books";

fn two_page_site() -> ListSite {
    let page_two = format!("{LIST_PATH}?page=2");
    let mut pages = HashMap::new();
    pages.insert(
        LIST_PATH.to_owned(),
        (
            200,
            listing_page(
                &[
                    ("Dune", "Frank Herbert", "4.27 avg rating — 1,000 ratings"),
                    ("Emma", "Jane Austen", "4.03 avg rating — 250 ratings"),
                    ("Ubik", "Philip K. Dick", "4.10 avg rating — 40 ratings"),
                ],
                Some(&page_two),
            ),
        ),
    );
    pages.insert(
        page_two,
        (
            200,
            listing_page(
                &[
                    ("Ubik", "Philip K. Dick", "4.10 avg rating — 40 ratings"),
                    ("Beloved", "Toni Morrison", "3.90 avg rating — 5,000 ratings"),
                ],
                None,
            ),
        ),
    );
    ListSite::spawn(pages)
}

fn csv_rows(path: &Path) -> anyhow::Result<Vec<csv::StringRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    Ok(reader.records().collect::<Result<Vec<_>, _>>()?)
}

fn checkpoint_files(dir: &Path) -> anyhow::Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with("checkpoint_") && name.ends_with(".json") {
            names.push(name);
        }
    }
    Ok(names)
}

#[test]
fn harvest_stops_when_the_list_runs_out() -> anyhow::Result<()> {
    let site = two_page_site();
    let temp = tempfile::tempdir()?;
    let out_dir = temp.path().join("data");
    let checkpoint_dir = temp.path().join("checkpoints");

    cargo_bin_cmd!("bookharvest")
        .args([
            "harvest",
            "--url",
            &format!("{}{LIST_PATH}", site.base_url),
            "--pages",
            "5",
            "--delay",
            "0",
            "--output",
            "books.csv",
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--checkpoint-dir",
            checkpoint_dir.to_str().unwrap(),
            "--session-id",
            "e2e",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== SUMMARY ==="))
        .stdout(predicate::str::contains("Saved 4 rows"));

    assert_eq!(
        site.requests(),
        vec![LIST_PATH.to_owned(), format!("{LIST_PATH}?page=2")]
    );

    let rows = csv_rows(&out_dir.join("books.csv"))?;
    let titles: Vec<&str> = rows.iter().map(|row| &row[0]).collect();
    // Sorted by ratings count, largest first; the repeated "Ubik" is dropped.
    assert_eq!(titles, vec!["Beloved", "Dune", "Emma", "Ubik"]);

    let dune = &rows[1];
    assert_eq!(&dune[1], "Frank Herbert");
    assert_eq!(&dune[3], "1000");
    assert_eq!(&dune[4], "120");
    assert!(dune[5].ends_with("/book/show/1"));

    assert!(checkpoint_files(&checkpoint_dir)?.is_empty());
    Ok(())
}

#[test]
fn resume_fetches_the_page_after_the_checkpoint() -> anyhow::Result<()> {
    let site = two_page_site();
    let temp = tempfile::tempdir()?;
    let checkpoint_dir = temp.path().join("checkpoints");
    std::fs::create_dir_all(&checkpoint_dir)?;

    let saved = serde_json::json!({
        "books": [
            {"title": "Dune", "author": "Frank Herbert", "average_rating": 4.27, "ratings_count": 1000},
            {"title": "Emma", "author": "Jane Austen", "average_rating": 4.03, "ratings_count": 250},
        ],
        "current_page": 1,
        "list_url": format!("{}{LIST_PATH}", site.base_url),
        "timestamp": 1_700_000_000.0,
        "total_books": 2,
    });
    std::fs::write(
        checkpoint_dir.join("checkpoint_r1.json"),
        serde_json::to_vec_pretty(&saved)?,
    )?;

    // The seed URL is taken from the checkpoint, not from --url.
    cargo_bin_cmd!("bookharvest")
        .args([
            "harvest",
            "--url",
            "http://127.0.0.1:9/unused",
            "--pages",
            "5",
            "--delay",
            "0",
            "--output-dir",
            temp.path().to_str().unwrap(),
            "--checkpoint-dir",
            checkpoint_dir.to_str().unwrap(),
            "--resume",
            "--session-id",
            "r1",
        ])
        .assert()
        .success();

    assert_eq!(site.requests(), vec![format!("{LIST_PATH}?page=2")]);

    let rows = csv_rows(&temp.path().join("goodreads_books.csv"))?;
    let titles: Vec<&str> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(titles, vec!["Beloved", "Dune", "Emma", "Ubik"]);

    assert!(checkpoint_files(&checkpoint_dir)?.is_empty());
    Ok(())
}

#[test]
fn resume_without_id_passes_over_unusable_checkpoint_names() -> anyhow::Result<()> {
    let site = two_page_site();
    let temp = tempfile::tempdir()?;
    let checkpoint_dir = temp.path().join("checkpoints");
    std::fs::create_dir_all(&checkpoint_dir)?;
    let saved = serde_json::json!({
        "books": [{"title": "Emma", "author": "Jane Austen"}],
        "current_page": 1,
        "list_url": format!("{}{LIST_PATH}", site.base_url),
        "timestamp": 2_000_000_000.0,
        "total_books": 1,
    });
    std::fs::write(
        checkpoint_dir.join("checkpoint_my run.json"),
        serde_json::to_vec(&saved)?,
    )?;

    cargo_bin_cmd!("bookharvest")
        .args([
            "harvest",
            "--url",
            &format!("{}{LIST_PATH}", site.base_url),
            "--pages",
            "1",
            "--delay",
            "0",
            "--output-dir",
            temp.path().to_str().unwrap(),
            "--checkpoint-dir",
            checkpoint_dir.to_str().unwrap(),
            "--resume",
        ])
        .assert()
        .success();

    assert_eq!(site.requests(), vec![LIST_PATH.to_owned()]);
    assert!(checkpoint_dir.join("checkpoint_my run.json").exists());
    Ok(())
}

#[test]
fn failed_page_keeps_a_checkpoint_for_resume() -> anyhow::Result<()> {
    let broken = format!("{LIST_PATH}?page=2");
    let mut pages = HashMap::new();
    pages.insert(
        LIST_PATH.to_owned(),
        (
            200,
            listing_page(
                &[("Dune", "Frank Herbert", "4.27 avg rating — 1,000 ratings")],
                Some(&broken),
            ),
        ),
    );
    pages.insert(broken, (500, "upstream exploded".to_owned()));
    let site = ListSite::spawn(pages);

    let temp = tempfile::tempdir()?;
    let checkpoint_dir = temp.path().join("checkpoints");

    cargo_bin_cmd!("bookharvest")
        .args([
            "harvest",
            "--url",
            &format!("{}{LIST_PATH}", site.base_url),
            "--pages",
            "5",
            "--delay",
            "0",
            "--output-dir",
            temp.path().to_str().unwrap(),
            "--checkpoint-dir",
            checkpoint_dir.to_str().unwrap(),
            "--session-id",
            "broken1",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Harvest failed"))
        .stdout(predicate::str::contains("--resume --session-id broken1"));

    assert_eq!(
        checkpoint_files(&checkpoint_dir)?,
        vec!["checkpoint_broken1.json".to_owned()]
    );
    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(checkpoint_dir.join("checkpoint_broken1.json"))?)?;
    assert_eq!(saved["current_page"], 1);
    assert_eq!(saved["total_books"], 1);
    assert!(!temp.path().join("goodreads_books.csv").exists());
    Ok(())
}

#[test]
fn existing_output_is_refused_before_fetching() -> anyhow::Result<()> {
    let site = two_page_site();
    let temp = tempfile::tempdir()?;
    std::fs::write(temp.path().join("books.csv"), "keep me\n")?;

    cargo_bin_cmd!("bookharvest")
        .args([
            "harvest",
            "--url",
            &format!("{}{LIST_PATH}", site.base_url),
            "--delay",
            "0",
            "--output",
            "books.csv",
            "--output-dir",
            temp.path().to_str().unwrap(),
            "--checkpoint-dir",
            temp.path().join("checkpoints").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    assert!(site.requests().is_empty());
    assert_eq!(
        std::fs::read_to_string(temp.path().join("books.csv"))?,
        "keep me\n"
    );
    Ok(())
}
