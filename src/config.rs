use std::env;
use std::path::PathBuf;
use url::Url;

use crate::ai::{self, ModelSpec};
use crate::ats::AtsConfig;
use crate::enricher::ResumeUrls;
use crate::error::ApplyError;
use crate::notion::NotionConfig;
use crate::politeness::{DelayRange, Politeness};
use crate::reconcile::UpsertPolicy;
use crate::robots;
use crate::storage::{DEFAULT_FALLBACK_PATH, DEFAULT_RESULTS_PATH};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ApplierBot/1.0)";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

const REQUIRED_VARS: [&str; 4] = ["NOTION_TOKEN", "NOTION_DATABASE_ID", "CV_FR_URL", "CV_ES_URL"];

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub model: ModelSpec,
    pub api_key: String,
    pub temperature: f32,
}

/// Everything read from the environment, once, at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    pub notion: NotionConfig,
    pub resumes: ResumeUrls,
    pub llm: Option<LlmConfig>,
    pub user_agent: String,
    /// Product token matched against robots.txt `User-agent` groups.
    pub robots_agent: String,
    pub dry_run: bool,
    pub upsert_policy: UpsertPolicy,
    pub politeness: Politeness,
    pub results_path: PathBuf,
    pub fallback_path: PathBuf,
    pub applicant_name: Option<String>,
    pub ats: Option<AtsConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ApplyError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Blank values count
    /// as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApplyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_blank(lookup(key));

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ApplyError::Configuration(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }
        let required = |key: &str| get(key).unwrap_or_default();

        let user_agent = get("DEFAULT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let robots_agent = get("ROBOTS_AGENT")
            .unwrap_or_else(|| robots::product_token(&user_agent).to_string());

        let politeness = Politeness {
            per_offer: parse_or(get("OFFER_DELAY"), "OFFER_DELAY", Politeness::default().per_offer)?,
            per_page: parse_or(get("PAGE_DELAY"), "PAGE_DELAY", Politeness::default().per_page)?,
        };

        Ok(Self {
            notion: NotionConfig {
                token: required("NOTION_TOKEN"),
                database_id: required("NOTION_DATABASE_ID"),
            },
            resumes: ResumeUrls {
                fr: required("CV_FR_URL"),
                es: required("CV_ES_URL"),
            },
            llm: llm_config(&get)?,
            user_agent,
            robots_agent,
            dry_run: match get("DRY_RUN") {
                Some(v) => parse_bool(&v).ok_or_else(|| {
                    ApplyError::Configuration(format!("DRY_RUN must be true or false, got '{}'", v))
                })?,
                None => true,
            },
            upsert_policy: parse_or(get("UPSERT_POLICY"), "UPSERT_POLICY", UpsertPolicy::default())?,
            politeness,
            results_path: storage_path(&get, StorageFile::Results),
            fallback_path: storage_path(&get, StorageFile::Fallback),
            applicant_name: get("APPLICANT_NAME"),
            ats: ats_config(&get)?,
        })
    }
}

/// The two local JSON files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFile {
    Results,
    Fallback,
}

impl StorageFile {
    fn var(self) -> &'static str {
        match self {
            StorageFile::Results => "RESULTS_PATH",
            StorageFile::Fallback => "FALLBACK_PATH",
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            StorageFile::Results => DEFAULT_RESULTS_PATH,
            StorageFile::Fallback => DEFAULT_FALLBACK_PATH,
        }
    }

    /// Path from the environment, for commands that need no other setting.
    pub fn path_from_env(self) -> PathBuf {
        storage_path(&|key: &str| non_blank(env::var(key).ok()), self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn storage_path(get: &dyn Fn(&str) -> Option<String>, file: StorageFile) -> PathBuf {
    get(file.var())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(file.default_path()))
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ApplyError>
where
    T: std::str::FromStr<Err = String>,
{
    match value {
        Some(v) => v
            .parse()
            .map_err(|e: String| ApplyError::Configuration(format!("{}: {}", key, e))),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// The language model is optional: without a key for the chosen provider the
/// templated letter is used.
fn llm_config(get: &dyn Fn(&str) -> Option<String>) -> Result<Option<LlmConfig>, ApplyError> {
    let name = get("LLM_MODEL").unwrap_or_else(|| ai::DEFAULT_MODEL.to_string());
    let model = ai::resolve_model(&name).map_err(|e| ApplyError::Configuration(e.to_string()))?;
    Ok(get(ai::API_KEY_VAR).map(|api_key| LlmConfig {
        model,
        api_key,
        temperature: DEFAULT_TEMPERATURE,
    }))
}

fn ats_config(get: &dyn Fn(&str) -> Option<String>) -> Result<Option<AtsConfig>, ApplyError> {
    let (Some(base), Some(client_id), Some(client_secret)) =
        (get("ATS_BASE_URL"), get("ATS_CLIENT_ID"), get("ATS_CLIENT_SECRET"))
    else {
        return Ok(None);
    };

    // Endpoints are joined onto the base, which therefore has to end in '/'.
    let base = if base.ends_with('/') { base } else { format!("{}/", base) };
    let base_url = Url::parse(&base)
        .map_err(|e| ApplyError::Configuration(format!("ATS_BASE_URL: {}", e)))?;

    Ok(Some(AtsConfig { base_url, client_id, client_secret }))
}
