use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use log::debug;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

use crate::models::OfferRecord;
use crate::reconcile::{LookupFilter, OfferStore};

const NOTION_API_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
/// Notion caps the content of a single rich text object.
const RICH_TEXT_LIMIT: usize = 2000;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageRef>,
}

pub struct NotionClient {
    client: Client,
    config: NotionConfig,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.config.token)
            .header("Notion-Version", NOTION_VERSION)
            .header("Content-Type", "application/json")
    }

    fn send(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let response = self
            .authorized(request)
            .send()
            .with_context(|| format!("Failed to send Notion {} request", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Notion {} request failed with status {}: {}",
                what,
                status,
                error_text
            ));
        }

        response
            .json()
            .with_context(|| format!("Failed to parse Notion {} response", what))
    }
}

impl OfferStore for NotionClient {
    fn find(&self, filter: &LookupFilter) -> Result<Vec<String>> {
        let url = format!("{}/databases/{}/query", NOTION_API_URL, self.config.database_id);
        let body = json!({ "filter": filter_json(filter) });
        debug!("Notion query: {}", body);

        let value = self.send(self.client.post(url).json(&body), "query")?;
        let response: QueryResponse =
            serde_json::from_value(value).context("Unexpected Notion query response")?;
        Ok(response.results.into_iter().map(|page| page.id).collect())
    }

    fn create(&self, offer: &OfferRecord) -> Result<String> {
        let url = format!("{}/pages", NOTION_API_URL);
        let body = json!({
            "parent": { "database_id": self.config.database_id },
            "properties": offer_properties(offer),
        });

        let value = self.send(self.client.post(url).json(&body), "create")?;
        let page: PageRef =
            serde_json::from_value(value).context("Notion create response has no page id")?;
        Ok(page.id)
    }

    fn update(&self, remote_id: &str, offer: &OfferRecord) -> Result<()> {
        let url = format!("{}/pages/{}", NOTION_API_URL, remote_id);
        let body = json!({ "properties": offer_properties(offer) });
        self.send(self.client.patch(url).json(&body), "update")?;
        Ok(())
    }
}

pub fn filter_json(filter: &LookupFilter) -> Value {
    match filter {
        LookupFilter::Link(link) => json!({
            "property": "Link",
            "url": { "equals": link },
        }),
        LookupFilter::TitleContains(title) => json!({
            "property": "Title",
            "title": { "contains": title },
        }),
    }
}

/// Notion property map for an offer. `Link`, `Date` and `CV` are left out
/// when there is nothing valid to send.
pub fn offer_properties(offer: &OfferRecord) -> Value {
    let mut props = json!({
        "Title": { "title": rich_text(&offer.title) },
        "Company": { "rich_text": rich_text(offer.company.as_deref().unwrap_or("")) },
        "Location": { "rich_text": rich_text(offer.location.as_deref().unwrap_or("")) },
        "Source": { "select": { "name": offer.source } },
        "CoverLetter": { "rich_text": rich_text(offer.cover_letter.as_deref().unwrap_or("")) },
        "Status": { "select": { "name": offer.status.as_str() } },
    });

    if let Some(link) = offer.link.as_deref().filter(|l| !l.is_empty()) {
        props["Link"] = json!({ "url": link });
    }
    if let Some(date) = offer.posted_date.as_deref().and_then(iso_date) {
        props["Date"] = json!({ "date": { "start": date } });
    }
    if let Some(cv) = offer.resume_url.as_deref().filter(|u| !u.is_empty()) {
        props["CV"] = json!({ "url": cv });
    }

    props
}

/// Listing dates are free text ("il y a 2 jours"); only plain ISO dates are
/// accepted by a Notion date property.
fn iso_date(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

fn rich_text(content: &str) -> Value {
    let chars: Vec<char> = content.chars().collect();
    let parts: Vec<Value> = chars
        .chunks(RICH_TEXT_LIMIT)
        .map(|chunk| {
            let text: String = chunk.iter().collect();
            json!({ "type": "text", "text": { "content": text } })
        })
        .collect();
    Value::Array(parts)
}
