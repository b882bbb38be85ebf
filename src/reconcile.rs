use anyhow::Result;
use log::{error, info};
use std::fmt;
use std::str::FromStr;

use crate::error::ApplyError;
use crate::models::OfferRecord;

/// How an offer is looked up in the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFilter {
    /// Exact match on the `Link` field.
    Link(String),
    /// Substring match on the `Title` field. Weak: distinct offers whose
    /// titles overlap are treated as the same one.
    TitleContains(String),
}

impl LookupFilter {
    /// The link when there is one, otherwise the title.
    pub fn for_offer(offer: &OfferRecord) -> Option<Self> {
        if let Some(link) = offer.link.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            return Some(LookupFilter::Link(link.to_string()));
        }
        let title = offer.title.trim();
        if title.is_empty() {
            None
        } else {
            Some(LookupFilter::TitleContains(title.to_string()))
        }
    }
}

// --- Store trait ---

/// Remote document store holding one record per offer. Implementations only
/// hand back record identifiers.
pub trait OfferStore {
    /// Identifiers of matching records, in store order.
    fn find(&self, filter: &LookupFilter) -> Result<Vec<String>>;
    fn create(&self, offer: &OfferRecord) -> Result<String>;
    fn update(&self, remote_id: &str, offer: &OfferRecord) -> Result<()>;
}

impl<S: OfferStore + ?Sized> OfferStore for &S {
    fn find(&self, filter: &LookupFilter) -> Result<Vec<String>> {
        (**self).find(filter)
    }

    fn create(&self, offer: &OfferRecord) -> Result<String> {
        (**self).create(offer)
    }

    fn update(&self, remote_id: &str, offer: &OfferRecord) -> Result<()> {
        (**self).update(remote_id, offer)
    }
}

/// What to do when the offer already exists remotely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UpsertPolicy {
    /// Leave the existing record untouched.
    #[default]
    Keep,
    /// Overwrite the existing record with the fresh offer.
    Overwrite,
}

impl FromStr for UpsertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" | "skip" => Ok(UpsertPolicy::Keep),
            "overwrite" | "update" => Ok(UpsertPolicy::Overwrite),
            other => Err(format!("unknown upsert policy '{}' (expected keep or overwrite)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStatus {
    Created,
    Updated,
    Exists,
    Error,
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileStatus::Created => "created",
            ReconcileStatus::Updated => "updated",
            ReconcileStatus::Exists => "exists",
            ReconcileStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileResult {
    pub status: ReconcileStatus,
    pub remote_id: Option<String>,
    pub error: Option<ApplyError>,
}

impl ReconcileResult {
    fn ok(status: ReconcileStatus, remote_id: String) -> Self {
        Self { status, remote_id: Some(remote_id), error: None }
    }

    fn failed(error: ApplyError) -> Self {
        Self { status: ReconcileStatus::Error, remote_id: None, error: Some(error) }
    }

    /// True when the offer could not be reconciled at all for lack of an
    /// identity key, as opposed to a store failure.
    pub fn is_invalid_record(&self) -> bool {
        matches!(self.error, Some(ApplyError::InvalidRecord))
    }
}

pub struct Reconciler<S> {
    store: S,
    policy: UpsertPolicy,
}

impl<S: OfferStore> Reconciler<S> {
    pub fn new(store: S, policy: UpsertPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> UpsertPolicy {
        self.policy
    }

    /// Dedup then create or update. Store failures come back as an `Error`
    /// result rather than an `Err`.
    pub fn reconcile(&self, offer: &OfferRecord) -> ReconcileResult {
        let Some(filter) = LookupFilter::for_offer(offer) else {
            return ReconcileResult::failed(ApplyError::InvalidRecord);
        };

        match self.upsert(offer, &filter) {
            Ok(result) => {
                info!(
                    "Offer '{}' {} in remote store ({})",
                    offer.title,
                    result.status,
                    result.remote_id.as_deref().unwrap_or("-")
                );
                result
            }
            Err(e) => {
                error!("Remote store failed for '{}': {:#}", offer.title, e);
                ReconcileResult::failed(ApplyError::Reconcile(format!("{:#}", e)))
            }
        }
    }

    fn upsert(&self, offer: &OfferRecord, filter: &LookupFilter) -> Result<ReconcileResult> {
        let matches = self.store.find(filter)?;

        // Only the first match is considered; extra duplicates stay as they are.
        if let Some(remote_id) = matches.into_iter().next() {
            return match self.policy {
                UpsertPolicy::Keep => Ok(ReconcileResult::ok(ReconcileStatus::Exists, remote_id)),
                UpsertPolicy::Overwrite => {
                    self.store.update(&remote_id, offer)?;
                    Ok(ReconcileResult::ok(ReconcileStatus::Updated, remote_id))
                }
            };
        }

        let remote_id = self.store.create(offer)?;
        Ok(ReconcileResult::ok(ReconcileStatus::Created, remote_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStore;

    fn offer(title: &str, link: Option<&str>) -> OfferRecord {
        let mut offer = OfferRecord::new(title, "hellowork");
        offer.link = link.map(String::from);
        offer
    }

    #[test]
    fn test_filter_prefers_link() {
        let o = offer("QA", Some("https://x/1"));
        assert_eq!(LookupFilter::for_offer(&o), Some(LookupFilter::Link("https://x/1".to_string())));

        let o = offer("QA", Some("  "));
        assert_eq!(LookupFilter::for_offer(&o), Some(LookupFilter::TitleContains("QA".to_string())));

        let o = offer("  ", None);
        assert_eq!(LookupFilter::for_offer(&o), None);
    }

    #[test]
    fn test_invalid_record_does_not_touch_store() {
        let store = MemoryStore::default();
        let reconciler = Reconciler::new(&store, UpsertPolicy::Keep);

        let result = reconciler.reconcile(&offer("", None));
        assert_eq!(result.status, ReconcileStatus::Error);
        assert!(result.is_invalid_record());
        assert_eq!(store.queries(), 0);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_second_pass_with_same_link_never_creates() {
        let store = MemoryStore::default();
        let keep = Reconciler::new(&store, UpsertPolicy::Keep);
        let o = offer("Testeur logiciel", Some("https://www.hellowork.com/fr-fr/emplois/1.html"));

        let first = keep.reconcile(&o);
        assert_eq!(first.status, ReconcileStatus::Created);

        let second = keep.reconcile(&o);
        assert_eq!(second.status, ReconcileStatus::Exists);
        assert_eq!(second.remote_id, first.remote_id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.updates(), 0);
    }

    #[test]
    fn test_overwrite_policy_updates_first_match() {
        let store = MemoryStore::default();
        let overwrite = Reconciler::new(&store, UpsertPolicy::Overwrite);
        let mut o = offer("Testeur logiciel", Some("https://x/1"));

        let first = overwrite.reconcile(&o);
        assert_eq!(first.status, ReconcileStatus::Created);

        o.company = Some("ACME".to_string());
        let second = overwrite.reconcile(&o);
        assert_eq!(second.status, ReconcileStatus::Updated);
        assert_eq!(second.remote_id, first.remote_id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.updates(), 1);
        assert_eq!(store.get(first.remote_id.as_deref().unwrap()).unwrap().company.as_deref(), Some("ACME"));
    }

    #[test]
    fn test_title_fallback_matches_overlapping_titles() {
        let store = MemoryStore::default();
        let reconciler = Reconciler::new(&store, UpsertPolicy::Keep);

        let senior = offer("Testeur logiciel senior", None);
        assert_eq!(reconciler.reconcile(&senior).status, ReconcileStatus::Created);

        // A different posting, but its title is a substring of the stored one.
        let other = offer("Testeur logiciel", None);
        let result = reconciler.reconcile(&other);
        assert_eq!(result.status, ReconcileStatus::Exists);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_multiple_matches_take_first_and_leave_duplicates() {
        let store = MemoryStore::default();
        let dup = offer("QA", Some("https://x/dup"));
        let first_id = store.insert(dup.clone());
        store.insert(dup.clone());

        let reconciler = Reconciler::new(&store, UpsertPolicy::Overwrite);
        let result = reconciler.reconcile(&dup);
        assert_eq!(result.status, ReconcileStatus::Updated);
        assert_eq!(result.remote_id.as_deref(), Some(first_id.as_str()));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_failure_is_an_error_result() {
        let store = MemoryStore::failing("connection refused");
        let reconciler = Reconciler::new(&store, UpsertPolicy::Keep);

        let result = reconciler.reconcile(&offer("QA", Some("https://x/1")));
        assert_eq!(result.status, ReconcileStatus::Error);
        assert!(!result.is_invalid_record());
        match result.error {
            Some(ApplyError::Reconcile(msg)) => assert!(msg.contains("connection refused")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("keep".parse::<UpsertPolicy>().unwrap(), UpsertPolicy::Keep);
        assert_eq!("Overwrite".parse::<UpsertPolicy>().unwrap(), UpsertPolicy::Overwrite);
        assert!("merge".parse::<UpsertPolicy>().is_err());
    }
}
