use log::{error, info, warn};

use crate::ats::Submitter;
use crate::enricher::Enricher;
use crate::extractor::Extractor;
use crate::fetcher::SearchSource;
use crate::models::{Locale, OfferRecord, OfferStatus};
use crate::politeness::Politeness;
use crate::reconcile::{OfferStore, ReconcileStatus, Reconciler};
use crate::storage::LocalStore;

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub query: String,
    pub pages: u32,
    pub locale: Locale,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub offers: Vec<OfferRecord>,
    pub robots_blocked: bool,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub created: usize,
    pub updated: usize,
    pub exists: usize,
    pub failed: usize,
    pub invalid: usize,
    pub submitted: usize,
}

impl RunReport {
    fn record(&mut self, status: ReconcileStatus, invalid: bool) {
        match status {
            ReconcileStatus::Created => self.created += 1,
            ReconcileStatus::Updated => self.updated += 1,
            ReconcileStatus::Exists => self.exists += 1,
            ReconcileStatus::Error if invalid => self.invalid += 1,
            ReconcileStatus::Error => self.failed += 1,
        }
    }
}

/// Optional ATS step. With `dry_run` set, offers are only logged.
pub struct Submission<'a> {
    pub submitter: &'a dyn Submitter,
    pub dry_run: bool,
}

pub struct Runner<'a> {
    pub source: &'a dyn SearchSource,
    pub extractor: &'a Extractor,
    pub enricher: &'a Enricher<'a>,
    pub reconciler: &'a Reconciler<&'a dyn OfferStore>,
    pub fallback: &'a LocalStore,
    pub results: &'a LocalStore,
    pub politeness: Politeness,
    pub submission: Option<Submission<'a>>,
}

impl Runner<'_> {
    /// Walks the requested result pages. Per-page and per-offer failures are
    /// logged and skipped; only a robots.txt refusal stops the run early.
    pub fn run(&self, request: &RunRequest) -> RunReport {
        let mut report = RunReport::default();
        info!(
            "Searching '{}' ({} page(s), locale {})",
            request.query,
            request.pages,
            request.locale.code()
        );

        if !self.source.search_allowed() {
            warn!("robots.txt disallows the search path, nothing fetched");
            report.robots_blocked = true;
            return report;
        }

        for page in 1..=request.pages {
            let html = match self.source.fetch_page(&request.query, page) {
                Ok(html) => html,
                Err(e) => {
                    error!("{}", e);
                    report.pages_failed += 1;
                    continue;
                }
            };
            report.pages_fetched += 1;

            let offers = self.extractor.extract(&html);
            info!("Page {}: {} offers found", page, offers.len());

            for offer in offers {
                let offer = self.process_offer(offer, request.locale, &mut report);
                report.offers.push(offer);
                self.politeness.pause_offer();
            }

            if page < request.pages {
                self.politeness.pause_page();
            }
        }

        if !report.offers.is_empty() {
            if let Err(e) = self.results.save(&report.offers) {
                error!("Failed to save batch backup: {:#}", e);
            }
        }

        info!("Done. Total offers processed: {}", report.offers.len());
        report
    }

    fn process_offer(&self, offer: OfferRecord, locale: Locale, report: &mut RunReport) -> OfferRecord {
        let mut offer = self.enricher.enrich(offer, locale);

        if let Some(submission) = &self.submission {
            if self.submit(submission, &mut offer) {
                report.submitted += 1;
            }
        }

        let result = self.reconciler.reconcile(&offer);
        report.record(result.status, result.is_invalid_record());

        if result.status == ReconcileStatus::Error && !result.is_invalid_record() {
            if let Err(e) = self.fallback.append(&offer) {
                error!("Failed to append '{}' to local fallback: {:#}", offer.title, e);
            }
        }

        offer
    }

    fn submit(&self, submission: &Submission, offer: &mut OfferRecord) -> bool {
        if submission.dry_run {
            info!("[DRY RUN] Would submit application for '{}'", offer.title);
            return false;
        }
        match submission.submitter.submit(offer) {
            Ok(reference) => {
                info!("Application for '{}' submitted ({})", offer.title, reference);
                offer.status = OfferStatus::Submitted;
                true
            }
            Err(e) => {
                warn!("Submission failed for '{}', keeping it prepare-only: {:#}", offer.title, e);
                false
            }
        }
    }
}
