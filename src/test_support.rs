//! In-memory stand-ins for the network-facing traits.

use anyhow::{Result, anyhow};
use std::cell::{Cell, RefCell};

use crate::ai::AIProvider;
use crate::ats::Submitter;
use crate::error::ApplyError;
use crate::fetcher::SearchSource;
use crate::models::OfferRecord;
use crate::reconcile::{LookupFilter, OfferStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<Vec<(String, OfferRecord)>>,
    next_id: Cell<usize>,
    queries: Cell<usize>,
    updates: Cell<usize>,
    failure: Option<String>,
}

impl MemoryStore {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn insert(&self, offer: OfferRecord) -> String {
        let id = format!("page-{}", self.next_id.get() + 1);
        self.next_id.set(self.next_id.get() + 1);
        self.records.borrow_mut().push((id.clone(), offer));
        id
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    pub fn updates(&self) -> usize {
        self.updates.get()
    }

    pub fn get(&self, id: &str) -> Option<OfferRecord> {
        self.records
            .borrow()
            .iter()
            .find(|(rid, _)| rid == id)
            .map(|(_, offer)| offer.clone())
    }

    fn check(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }
}

impl OfferStore for MemoryStore {
    fn find(&self, filter: &LookupFilter) -> Result<Vec<String>> {
        self.queries.set(self.queries.get() + 1);
        self.check()?;
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|(_, offer)| match filter {
                LookupFilter::Link(link) => offer.link.as_deref() == Some(link.as_str()),
                LookupFilter::TitleContains(title) => offer.title.contains(title.as_str()),
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn create(&self, offer: &OfferRecord) -> Result<String> {
        self.check()?;
        Ok(self.insert(offer.clone()))
    }

    fn update(&self, remote_id: &str, offer: &OfferRecord) -> Result<()> {
        self.check()?;
        let mut records = self.records.borrow_mut();
        let record = records
            .iter_mut()
            .find(|(id, _)| id == remote_id)
            .ok_or_else(|| anyhow!("no page {}", remote_id))?;
        record.1 = offer.clone();
        self.updates.set(self.updates.get() + 1);
        Ok(())
    }
}

pub struct FailingProvider {
    message: String,
    calls: Cell<usize>,
}

impl FailingProvider {
    pub fn timeout() -> Self {
        Self {
            message: "operation timed out".to_string(),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl AIProvider for FailingProvider {
    fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        Err(anyhow!("{}", self.message))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

pub struct FixedProvider {
    answer: String,
    last_prompt: RefCell<String>,
}

impl FixedProvider {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            last_prompt: RefCell::new(String::new()),
        }
    }

    pub fn last_prompt(&self) -> String {
        self.last_prompt.borrow().clone()
    }
}

impl AIProvider for FixedProvider {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        *self.last_prompt.borrow_mut() = prompt.to_string();
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Serves canned pages; `None` entries fail like an unreachable page.
pub struct FakeSource {
    allowed: bool,
    pages: Vec<Option<String>>,
    robots_checks: Cell<usize>,
    fetches: Cell<usize>,
}

impl FakeSource {
    pub fn new(pages: Vec<Option<String>>) -> Self {
        Self {
            allowed: true,
            pages,
            robots_checks: Cell::new(0),
            fetches: Cell::new(0),
        }
    }

    pub fn disallowed() -> Self {
        Self {
            allowed: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn robots_checks(&self) -> usize {
        self.robots_checks.get()
    }

    pub fn fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl SearchSource for FakeSource {
    fn search_allowed(&self) -> bool {
        self.robots_checks.set(self.robots_checks.get() + 1);
        self.allowed
    }

    fn fetch_page(&self, _query: &str, page: u32) -> Result<String, ApplyError> {
        self.fetches.set(self.fetches.get() + 1);
        self.pages
            .get(page as usize - 1)
            .cloned()
            .flatten()
            .ok_or_else(|| ApplyError::Fetch {
                page,
                reason: "HTTP 503 Service Unavailable".to_string(),
            })
    }
}

#[derive(Default)]
pub struct RecordingSubmitter {
    fail: bool,
    submitted: RefCell<Vec<String>>,
}

impl RecordingSubmitter {
    pub fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.borrow().clone()
    }
}

impl Submitter for RecordingSubmitter {
    fn submit(&self, offer: &OfferRecord) -> Result<String> {
        self.submitted.borrow_mut().push(offer.title.clone());
        if self.fail {
            return Err(anyhow!("ATS rejected the application"));
        }
        Ok(format!("app-{}", self.submitted.borrow().len()))
    }
}
