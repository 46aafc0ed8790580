// src/source.rs
//! Job posting acquisition.
//!
//! The live path scrapes the LinkedIn guest search endpoint, which serves
//! result cards without authentication. Scraping is best effort: any network
//! or markup failure degrades to `FetchOutcome::Unavailable`, and the caller
//! substitutes deterministic sample postings so the rest of the run still
//! exercises the full flow.

use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::RawPosting;

const GUEST_SEARCH_URL: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

// Card markup shifts between LinkedIn revisions; each field gets a cascade
// of selectors tried in order.
const CARD_SELECTORS: &[&str] = &["div.base-card", "li div.base-search-card", "li"];
const TITLE_SELECTORS: &[&str] = &["h3.base-search-card__title", ".base-search-card__title", "h3"];
const COMPANY_SELECTORS: &[&str] = &[
    "h4.base-search-card__subtitle",
    ".base-search-card__subtitle",
    "a.hidden-nested-link",
];
const LOCATION_SELECTORS: &[&str] = &["span.job-search-card__location", ".job-search-card__location"];
const LINK_SELECTORS: &[&str] = &["a.base-card__full-link", "a[href]"];
const SALARY_SELECTORS: &[&str] = &["span.job-search-card__salary-info"];

/// Outcome of a fetch attempt. `Unavailable` means the source could not be
/// reached or returned nothing usable, not that zero jobs matched.
#[derive(Debug)]
pub enum FetchOutcome {
    Live(Vec<RawPosting>),
    Unavailable,
}

pub struct JobSource {
    client: reqwest::Client,
}

impl JobSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// Query every keyword/location combination and pool the results, capped
    /// at `max_postings`. Individual request failures are logged and skipped.
    pub async fn fetch(
        &self,
        keywords: &[String],
        locations: &[String],
        max_postings: usize,
    ) -> FetchOutcome {
        let mut postings: Vec<RawPosting> = Vec::new();
        let mut any_success = false;

        'combos: for keyword in keywords {
            for location in locations {
                match self.fetch_page(keyword, location).await {
                    Ok(html) => {
                        any_success = true;
                        let batch = parse_listing(&html);
                        debug!(
                            keyword = %keyword,
                            location = %location,
                            count = batch.len(),
                            "Parsed search page"
                        );
                        postings.extend(batch);
                        if postings.len() >= max_postings {
                            break 'combos;
                        }
                    }
                    Err(e) => {
                        warn!(
                            keyword = %keyword,
                            location = %location,
                            "Search request failed: {:#}",
                            e
                        );
                    }
                }
            }
        }

        postings.truncate(max_postings);
        if !any_success || postings.is_empty() {
            info!("Live job source unavailable");
            FetchOutcome::Unavailable
        } else {
            info!("Fetched {} postings from live source", postings.len());
            FetchOutcome::Live(postings)
        }
    }

    async fn fetch_page(&self, keyword: &str, location: &str) -> Result<String> {
        let response = self
            .client
            .get(GUEST_SEARCH_URL)
            .query(&[("keywords", keyword), ("location", location), ("start", "0")])
            .send()
            .await
            .context("Request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Search endpoint returned HTTP {}", status);
        }
        response.text().await.context("Failed to read response body")
    }
}

/// Parse result cards out of a guest search page. Cards missing a title or
/// company are dropped rather than stored half-empty.
pub fn parse_listing(html: &str) -> Vec<RawPosting> {
    let document = Html::parse_document(html);
    let mut postings = Vec::new();

    for card_selector in CARD_SELECTORS {
        let selector = match Selector::parse(card_selector) {
            Ok(s) => s,
            Err(_) => continue,
        };
        for card in document.select(&selector) {
            let title = match find_text_by_selectors(&card, TITLE_SELECTORS) {
                Some(t) => t,
                None => continue,
            };
            let company = match find_text_by_selectors(&card, COMPANY_SELECTORS) {
                Some(c) => c,
                None => continue,
            };
            let location = find_text_by_selectors(&card, LOCATION_SELECTORS)
                .unwrap_or_else(|| "Not specified".to_string());
            let url = find_link(&card).unwrap_or_default();
            let salary = find_text_by_selectors(&card, SALARY_SELECTORS);

            postings.push(RawPosting {
                description: format!("{} position at {}", title, company),
                title,
                company,
                location,
                salary,
                url,
                source: "LinkedIn".to_string(),
            });
        }
        if !postings.is_empty() {
            break;
        }
    }
    postings
}

fn find_text_by_selectors(element: &ElementRef, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(found) = element.select(&selector).next() {
                let text = clean_text(&found.text().collect::<String>());
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

fn find_link(element: &ElementRef) -> Option<String> {
    for raw in LINK_SELECTORS {
        if let Ok(selector) = Selector::parse(raw) {
            if let Some(href) = element
                .select(&selector)
                .next()
                .and_then(|a| a.value().attr("href"))
            {
                // Guest pages append tracking query parameters.
                let trimmed = href.split('?').next().unwrap_or(href);
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

const SAMPLE_COMPANIES: &[&str] = &[
    "Netflix",
    "Spotify",
    "Uber",
    "Airbnb",
    "Tesla",
    "Meta",
    "Deloitte",
    "Accenture",
    "PwC",
    "KPMG",
];

const SAMPLE_LEVELS: &[&str] = &["", "Senior ", "Lead ", "Staff "];

/// Deterministic stand-in postings used when the live source is down. The
/// same configuration always yields the same postings, so re-running a cycle
/// never re-inserts them.
pub fn sample_postings(
    keywords: &[String],
    locations: &[String],
    max_postings: usize,
) -> Vec<RawPosting> {
    let mut postings = Vec::new();
    let mut index = 0usize;

    'outer: for keyword in keywords {
        for location in locations {
            for company in SAMPLE_COMPANIES {
                if postings.len() >= max_postings {
                    break 'outer;
                }
                let level = SAMPLE_LEVELS[index % SAMPLE_LEVELS.len()];
                let title = format!("{}{}", level, title_case(keyword));
                let salary_low = 90 + 10 * (index % 6);
                let description = format!(
                    "{} is hiring a {} in {}. You will design, build and operate \
                     systems central to the {} roadmap, working with a cross-functional \
                     team of engineers, analysts and product managers.",
                    company, title, location, keyword
                );
                postings.push(RawPosting {
                    title,
                    company: company.to_string(),
                    location: location.clone(),
                    description,
                    salary: Some(format!("${},000 - ${},000", salary_low, salary_low + 30)),
                    url: format!(
                        "https://careers.example.com/{}/{}",
                        slug(company),
                        slug(keyword)
                    ),
                    source: "Sample".to_string(),
                });
                index += 1;
            }
        }
    }
    postings
}

fn title_case(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_HTML: &str = r#"
<ul>
  <li>
    <div class="base-card">
      <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/123?trk=guest"></a>
      <h3 class="base-search-card__title">
        Data Engineer
      </h3>
      <h4 class="base-search-card__subtitle">Acme Corp</h4>
      <span class="job-search-card__location">Berlin, Germany</span>
    </div>
  </li>
  <li>
    <div class="base-card">
      <h3 class="base-search-card__title">Backend Engineer</h3>
    </div>
  </li>
</ul>
"#;

    #[test]
    fn test_parse_listing_extracts_complete_cards() {
        let postings = parse_listing(CARD_HTML);
        // The second card has no company and is dropped.
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].title, "Data Engineer");
        assert_eq!(postings[0].company, "Acme Corp");
        assert_eq!(postings[0].location, "Berlin, Germany");
        assert_eq!(postings[0].url, "https://www.linkedin.com/jobs/view/123");
        assert_eq!(postings[0].source, "LinkedIn");
    }

    #[test]
    fn test_parse_listing_empty_page() {
        assert!(parse_listing("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_sample_postings_are_deterministic() {
        let keywords = vec!["data engineer".to_string()];
        let locations = vec!["Remote".to_string()];
        let a = sample_postings(&keywords, &locations, 8);
        let b = sample_postings(&keywords, &locations, 8);
        assert_eq!(a.len(), 8);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.title, y.title);
            assert_eq!(x.company, y.company);
            assert_eq!(x.salary, y.salary);
        }
    }

    #[test]
    fn test_sample_postings_respect_cap() {
        let keywords = vec!["rust developer".to_string(), "data engineer".to_string()];
        let locations = vec!["Remote".to_string(), "Berlin".to_string()];
        let postings = sample_postings(&keywords, &locations, 5);
        assert_eq!(postings.len(), 5);
        assert!(postings.iter().all(|p| p.source == "Sample"));
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Data \n  Engineer  "), "Data Engineer");
    }
}
