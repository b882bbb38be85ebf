use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>, // free-form, as shown on the listing
    #[serde(default)]
    pub link: Option<String>,
    pub source: String, // "hellowork", ...
    #[serde(default)]
    pub cover_letter: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
    #[serde(default)]
    pub status: OfferStatus,
}

impl OfferRecord {
    pub fn new(title: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            company: None,
            location: None,
            posted_date: None,
            link: None,
            source: source.into(),
            cover_letter: None,
            resume_url: None,
            status: OfferStatus::Saved,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    #[default]
    Saved,
    Submitted,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Saved => "Saved",
            OfferStatus::Submitted => "Submitted",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Language used for the cover letter and for picking the resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Fr,
    Es,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Fr => "fr",
            Locale::Es => "es",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fr" => Ok(Locale::Fr),
            "es" => Ok(Locale::Es),
            other => Err(format!("unsupported locale '{}' (expected fr or es)", other)),
        }
    }
}
