//! Experimental direct submission to an ATS partner API.
//!
//! The endpoints and payload below are a best guess and have not been checked
//! against a real partner contract. Nothing is sent unless the three
//! `ATS_*` settings are present and dry-run is switched off.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::models::OfferRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub trait Submitter {
    /// Submits an application for `offer`, returning the partner's reference.
    fn submit(&self, offer: &OfferRecord) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AtsConfig {
    pub base_url: Url,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ApplicationPayload<'a> {
    pub job_title: &'a str,
    pub company: Option<&'a str>,
    pub job_url: Option<&'a str>,
    pub cover_letter: Option<&'a str>,
    pub resume_url: Option<&'a str>,
    pub source: &'a str,
}

impl<'a> ApplicationPayload<'a> {
    pub fn from_offer(offer: &'a OfferRecord) -> Self {
        Self {
            job_title: &offer.title,
            company: offer.company.as_deref(),
            job_url: offer.link.as_deref(),
            cover_letter: offer.cover_letter.as_deref(),
            resume_url: offer.resume_url.as_deref(),
            source: &offer.source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionResponse {
    id: String,
}

pub struct AtsClient {
    client: Client,
    config: AtsConfig,
}

impl AtsClient {
    pub fn new(config: AtsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .with_context(|| format!("Invalid ATS endpoint {}", path))
    }

    fn authenticate(&self) -> Result<String> {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
        };

        let response = self
            .client
            .post(self.endpoint("oauth/token")?)
            .json(&request)
            .send()
            .context("Failed to reach ATS token endpoint")?;

        if !response.status().is_success() {
            return Err(anyhow!("ATS authentication failed with status {}", response.status()));
        }

        let token: TokenResponse = response
            .json()
            .context("Failed to parse ATS token response")?;
        Ok(token.access_token)
    }
}

impl Submitter for AtsClient {
    fn submit(&self, offer: &OfferRecord) -> Result<String> {
        let token = self.authenticate()?;

        let response = self
            .client
            .post(self.endpoint("applications")?)
            .bearer_auth(token)
            .json(&ApplicationPayload::from_offer(offer))
            .send()
            .context("Failed to send ATS application")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "ATS submission failed with status {}: {}",
                status,
                error_text
            ));
        }

        let submission: SubmissionResponse = response
            .json()
            .context("Failed to parse ATS submission response")?;
        Ok(submission.id)
    }
}
