use anyhow::Context as _;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::formats::BookRecord;

const ENTRY_SELECTOR: &str =
    r#"tr[itemtype="http://schema.org/Book"], tr[itemtype="https://schema.org/Book"]"#;
const TITLE_SELECTOR: &str = "a.bookTitle";
const AUTHOR_SELECTOR: &str = "a.authorName";
const RATING_TEXT_SELECTORS: [&str; 2] = ["span.minirating", "span.greyText"];
const GREY_TEXT_SELECTOR: &str = "span.greyText";
const SPAN_SELECTOR: &str = "span";
const REVIEW_LINK_SELECTOR: &str = r#"a[href*="book_review"]"#;

const AVERAGE_RATING_PATTERNS: [&str; 1] = [r"(\d+\.\d+)"];
const RATINGS_COUNT_PATTERNS: [&str; 3] = [
    r"(?i)([\d,]+)\s*ratings?",
    r"(?i)([\d,]+)\s*rating",
    r"(?i)avg\s*rating\s*—\s*([\d,]+)\s*ratings?",
];
const REVIEWS_COUNT_PATTERNS: [&str; 3] = [
    r"(?i)([\d,]+)\s*reviews?",
    r"(?i)([\d,]+)\s*review",
    r"(?i)—\s*([\d,]+)\s*reviews?",
];
const REVIEW_MENTION_PATTERN: &str = r"(?i)\d+.*review";

/// One step of an ordered fallback: a pattern and how to read its capture.
struct FieldRule<T> {
    pattern: Regex,
    interpret: fn(&str) -> Option<T>,
}

impl<T> FieldRule<T> {
    fn new(pattern: &str, interpret: fn(&str) -> Option<T>) -> anyhow::Result<Self> {
        let pattern =
            Regex::new(pattern).with_context(|| format!("compile field pattern: {pattern}"))?;
        Ok(Self { pattern, interpret })
    }

    fn apply(&self, text: &str) -> Option<T> {
        let captures = self.pattern.captures(text)?;
        let matched = captures.get(1).or_else(|| captures.get(0))?;
        (self.interpret)(matched.as_str())
    }
}

fn compile_rules<T>(
    patterns: &[&str],
    interpret: fn(&str) -> Option<T>,
) -> anyhow::Result<Vec<FieldRule<T>>> {
    patterns
        .iter()
        .map(|pattern| FieldRule::new(pattern, interpret))
        .collect()
}

/// First rule that yields a value wins.
fn first_match<T>(rules: &[FieldRule<T>], text: &str) -> Option<T> {
    rules.iter().find_map(|rule| rule.apply(text))
}

pub(crate) fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err:?}"))
}

/// Turns listing-page markup into book records.
pub struct Extractor {
    entry: Selector,
    title: Selector,
    author: Selector,
    rating_text: Vec<Selector>,
    grey_text: Selector,
    span: Selector,
    review_link: Selector,
    average_rating: Vec<FieldRule<f64>>,
    ratings_count: Vec<FieldRule<u64>>,
    reviews_count: Vec<FieldRule<u64>>,
    review_mention: Regex,
}

impl Extractor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            entry: parse_selector(ENTRY_SELECTOR)?,
            title: parse_selector(TITLE_SELECTOR)?,
            author: parse_selector(AUTHOR_SELECTOR)?,
            rating_text: RATING_TEXT_SELECTORS
                .iter()
                .map(|css| parse_selector(css))
                .collect::<anyhow::Result<_>>()?,
            grey_text: parse_selector(GREY_TEXT_SELECTOR)?,
            span: parse_selector(SPAN_SELECTOR)?,
            review_link: parse_selector(REVIEW_LINK_SELECTOR)?,
            average_rating: compile_rules(&AVERAGE_RATING_PATTERNS, parse_rating)?,
            ratings_count: compile_rules(&RATINGS_COUNT_PATTERNS, parse_count)?,
            reviews_count: compile_rules(&REVIEWS_COUNT_PATTERNS, parse_count)?,
            review_mention: Regex::new(REVIEW_MENTION_PATTERN)
                .context("compile review mention pattern")?,
        })
    }

    pub fn extract_markup(&self, markup: &str, page_url: &Url) -> Vec<BookRecord> {
        let document = Html::parse_document(markup);
        self.extract(&document, page_url)
    }

    /// Entries without a title are dropped; every other problem only leaves
    /// fields empty.
    pub fn extract(&self, document: &Html, page_url: &Url) -> Vec<BookRecord> {
        let mut records = Vec::new();
        let mut skipped = 0_usize;
        for entry in document.select(&self.entry) {
            match self.extract_entry(entry, page_url) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, url = %page_url, "entries without title skipped");
        }
        records
    }

    fn extract_entry(&self, entry: ElementRef<'_>, page_url: &Url) -> Option<BookRecord> {
        let title_link = entry.select(&self.title).next()?;
        let title = element_text(title_link);
        if title.is_empty() {
            return None;
        }

        let mut record = BookRecord::titled(title);
        record.source_url = title_link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .and_then(|href| page_url.join(href).ok())
            .map(String::from);
        record.author = entry
            .select(&self.author)
            .next()
            .map(element_text)
            .filter(|author| !author.is_empty());

        if let Some(text) = self.rating_text(entry) {
            record.average_rating = first_match(&self.average_rating, &text);
            record.ratings_count = first_match(&self.ratings_count, &text);
            record.reviews_count = first_match(&self.reviews_count, &text);
        }
        if record.reviews_count.is_none() {
            record.reviews_count = self.alternate_reviews_count(entry);
        }

        tracing::debug!(
            title = %record.title,
            average_rating = ?record.average_rating,
            ratings_count = ?record.ratings_count,
            reviews_count = ?record.reviews_count,
            "entry extracted"
        );
        Some(record)
    }

    fn rating_text(&self, entry: ElementRef<'_>) -> Option<String> {
        self.rating_text.iter().find_map(|selector| {
            entry
                .select(selector)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
    }

    fn alternate_reviews_count(&self, entry: ElementRef<'_>) -> Option<u64> {
        let mention = entry
            .select(&self.span)
            .map(element_text)
            .find(|text| self.review_mention.is_match(text));
        let link = entry.select(&self.review_link).next().map(element_text);

        mention
            .into_iter()
            .chain(link)
            .chain(entry.select(&self.grey_text).map(element_text))
            .find_map(|text| {
                // Only the plain "<num> reviews" shape counts here.
                self.reviews_count.first()?.apply(&text)
            })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads an integer count such as `"1,234,567"`; returns `None` when no digits
/// are present.
pub fn parse_count(text: &str) -> Option<u64> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    let digits: String = cleaned
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

pub fn parse_rating(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
