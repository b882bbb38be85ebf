use anyhow::{Context, Result, anyhow};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

use crate::models::OfferRecord;

/// CSS selectors used to pull offers out of a result page.
///
/// Every list is tried in order and the first entry that yields something
/// wins, so adapting to a layout change means editing this table (or a JSON
/// file passed with `--selectors`) rather than code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorTable {
    /// Selector groups locating offer containers: primary first, then fallbacks.
    pub containers: Vec<String>,
    /// Title element candidates; its `href` becomes the offer link.
    pub title: Vec<String>,
    pub company: Vec<String>,
    pub location: Vec<String>,
    pub date: Vec<String>,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            containers: vec![
                "article, .job-item, .result-item, .results__item".to_string(),
                ".listing-item, .annonce, .offer, .job-card".to_string(),
            ],
            title: vec![
                "h2 a".to_string(),
                "a.job-title".to_string(),
                "a.offer-title".to_string(),
                ".job-title a".to_string(),
            ],
            company: vec![
                ".company".to_string(),
                ".job-company".to_string(),
                ".offer-company".to_string(),
                ".company-name".to_string(),
            ],
            location: vec![
                ".locality".to_string(),
                ".job-location".to_string(),
                ".offer-location".to_string(),
            ],
            date: vec![
                ".date".to_string(),
                ".job-date".to_string(),
                ".offer-date".to_string(),
            ],
        }
    }
}

impl SelectorTable {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read selector file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid selector file: {}", path.display()))
    }
}

pub struct Extractor {
    containers: Vec<Selector>,
    title: Vec<Selector>,
    company: Vec<Selector>,
    location: Vec<Selector>,
    date: Vec<Selector>,
    base_url: Url,
    source: String,
}

impl Extractor {
    pub fn new(table: &SelectorTable, base_url: Url, source: &str) -> Result<Self> {
        Ok(Self {
            containers: compile_selectors(&table.containers)?,
            title: compile_selectors(&table.title)?,
            company: compile_selectors(&table.company)?,
            location: compile_selectors(&table.location)?,
            date: compile_selectors(&table.date)?,
            base_url,
            source: source.to_string(),
        })
    }

    /// Offers found on one result page. Containers without a title are skipped.
    pub fn extract(&self, html: &str) -> Vec<OfferRecord> {
        let document = Html::parse_document(html);

        let containers: Vec<ElementRef> = self
            .containers
            .iter()
            .map(|selector| document.select(selector).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();

        containers
            .into_iter()
            .filter_map(|container| self.extract_offer(container))
            .collect()
    }

    fn extract_offer(&self, container: ElementRef) -> Option<OfferRecord> {
        let title_el = first_with_text(container, &self.title)?;
        let title = element_text(title_el);
        if title.is_empty() {
            return None;
        }

        let mut offer = OfferRecord::new(title, self.source.as_str());
        offer.link = title_el
            .value()
            .attr("href")
            .and_then(|href| self.resolve_link(href));
        offer.company = text_with_fallbacks(container, &self.company);
        offer.location = text_with_fallbacks(container, &self.location);
        offer.posted_date = text_with_fallbacks(container, &self.date);
        Some(offer)
    }

    fn resolve_link(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        self.base_url.join(href).ok().map(String::from)
    }
}

fn compile_selectors(selector_strings: &[String]) -> Result<Vec<Selector>> {
    selector_strings
        .iter()
        .map(|s| Selector::parse(s).map_err(|e| anyhow!("Invalid CSS selector '{}': {:?}", s, e)))
        .collect()
}

fn first_with_text<'a>(container: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .flat_map(|selector| container.select(selector).next())
        .find(|el| !element_text(*el).is_empty())
}

fn text_with_fallbacks(container: ElementRef, selectors: &[Selector]) -> Option<String> {
    first_with_text(container, selectors).map(element_text)
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
