use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::extract::parse_selector;

const NEXT_LINK_SELECTOR: &str = "a.next_page";
const ANY_LINK_SELECTOR: &str = "a[href]";

/// Finds the "next page" link of a listing page.
pub struct Navigator {
    next_link: Selector,
    any_link: Selector,
    next_text: Regex,
}

impl Navigator {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            next_link: parse_selector(NEXT_LINK_SELECTOR)?,
            any_link: parse_selector(ANY_LINK_SELECTOR)?,
            next_text: Regex::new(r"(?i)next")?,
        })
    }

    pub fn next_page_in_markup(&self, markup: &str, current_url: &Url) -> Option<Url> {
        let document = Html::parse_document(markup);
        self.next_page(&document, current_url)
    }

    /// `None` means the list is exhausted.
    pub fn next_page(&self, document: &Html, current_url: &Url) -> Option<Url> {
        let href = document
            .select(&self.next_link)
            .find_map(|link| non_empty_href(link.value().attr("href")))
            .or_else(|| {
                document
                    .select(&self.any_link)
                    .filter(|link| {
                        let text = link.text().collect::<String>();
                        self.next_text.is_match(&text)
                    })
                    .find_map(|link| non_empty_href(link.value().attr("href")))
            })?;

        let next = match current_url.join(href) {
            Ok(next) => next,
            Err(err) => {
                tracing::debug!(%href, ?err, "next page href does not resolve");
                return None;
            }
        };
        if next.scheme() != "http" && next.scheme() != "https" {
            tracing::debug!(%next, "next page link is not http(s)");
            return None;
        }
        if &next == current_url {
            tracing::debug!(%next, "next page link points at the current page");
            return None;
        }
        Some(next)
    }
}

fn non_empty_href(href: Option<&str>) -> Option<&str> {
    href.map(str::trim)
        .filter(|href| !href.is_empty() && *href != "#")
}

/// URL of page `page_number` of a listing whose first page is `seed`.
pub fn page_url(seed: &Url, page_number: usize) -> Url {
    if page_number <= 1 {
        return seed.clone();
    }

    let kept: Vec<(String, String)> = seed
        .query_pairs()
        .filter(|(key, _)| key != "page")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = seed.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("page", &page_number.to_string());
    }
    url
}
