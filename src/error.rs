use thiserror::Error;

/// Failure kinds of a run. Everything except `Configuration` and
/// `RobotsDisallowed` is contained at the page or offer level.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("Failed to fetch search page {page}: {reason}")]
    Fetch { page: u32, reason: String },

    #[error("Cover letter generation failed: {0}")]
    Enrichment(String),

    #[error("Remote store error: {0}")]
    Reconcile(String),

    #[error("Offer has neither link nor title to reconcile on")]
    InvalidRecord,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("robots.txt disallows crawling {0}")]
    RobotsDisallowed(String),
}
