mod ai;
mod ats;
mod config;
mod enricher;
mod error;
mod extractor;
mod fetcher;
mod logger;
mod models;
mod notion;
mod politeness;
mod reconcile;
mod robots;
mod runner;
mod storage;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use ats::AtsClient;
use config::{Config, StorageFile};
use enricher::Enricher;
use error::ApplyError;
use extractor::{Extractor, SelectorTable};
use fetcher::{DEFAULT_BASE_URL, DEFAULT_SEARCH_PATH, SearchClient, SiteConfig};
use models::Locale;
use notion::NotionClient;
use reconcile::{OfferStore, Reconciler, UpsertPolicy};
use runner::{RunReport, RunRequest, Runner, Submission};
use storage::LocalStore;

#[derive(Parser)]
#[command(name = "applier")]
#[command(about = "Scrape job offers, draft cover letters and sync them to Notion")]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape search results and reconcile every offer with Notion
    Run {
        /// Search keywords, e.g. "testeur logiciel"
        #[arg(short, long)]
        query: String,

        /// Number of result pages to scrape
        #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,

        /// Language of the cover letter and resume
        #[arg(long, value_enum, default_value_t = Locale::Fr)]
        lang: Locale,

        /// Base origin of the job board
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base: String,

        /// Search path on the job board
        #[arg(long, default_value = DEFAULT_SEARCH_PATH)]
        path: String,

        /// What to do with offers already in Notion (overrides UPSERT_POLICY)
        #[arg(long, value_enum)]
        policy: Option<UpsertPolicy>,

        /// JSON file with custom CSS selectors
        #[arg(long)]
        selectors: Option<PathBuf>,
    },

    /// List offers saved locally
    Saved {
        /// Show the fallback log (offers Notion did not accept) instead of the last run
        #[arg(long)]
        fallback: bool,

        /// Print cover letters too
        #[arg(long)]
        letters: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    match cli.command {
        Commands::Run {
            query,
            pages,
            lang,
            base,
            path,
            policy,
            selectors,
        } => {
            // Configuration problems must surface before any request goes out.
            let config = Config::from_env()?;
            let site = SiteConfig::new(&base, &path)?;
            let table = match selectors {
                Some(file) => SelectorTable::from_json_file(&file)?,
                None => SelectorTable::default(),
            };
            let request = RunRequest { query, pages, locale: lang };
            let report = run(&config, site, &table, policy, &request)?;
            print_report(&report);
        }

        Commands::Saved { fallback, letters } => {
            // Only the storage paths are needed here, not the full configuration.
            let file = if fallback { StorageFile::Fallback } else { StorageFile::Results };
            print_saved(&LocalStore::new(file.path_from_env()), letters);
        }
    }

    Ok(())
}

fn run(
    config: &Config,
    site: SiteConfig,
    table: &SelectorTable,
    policy: Option<UpsertPolicy>,
    request: &RunRequest,
) -> Result<RunReport> {
    let extractor = Extractor::new(table, site.base_url.clone(), &site.source)?;
    let search_path = site.search_path.clone();
    let source = SearchClient::new(site, &config.user_agent, &config.robots_agent)?;

    let provider = match &config.llm {
        Some(llm) => {
            info!("Cover letters generated with {}", llm.model.model_id);
            Some(ai::create_provider(&llm.model, &llm.api_key, llm.temperature)?)
        }
        None => {
            info!("No language model key configured, using templated cover letters");
            None
        }
    };
    let enricher = Enricher::new(
        provider.as_deref(),
        &config.resumes,
        config.applicant_name.as_deref(),
    );

    let notion = NotionClient::new(config.notion.clone())?;
    let store: &dyn OfferStore = &notion;
    let reconciler = Reconciler::new(store, policy.unwrap_or(config.upsert_policy));
    info!("Upsert policy: {:?}", reconciler.policy());

    let fallback = LocalStore::new(&config.fallback_path);
    let results = LocalStore::new(&config.results_path);

    let ats = config.ats.clone().map(AtsClient::new).transpose()?;
    let submission = ats.as_ref().map(|client| Submission {
        submitter: client,
        dry_run: config.dry_run,
    });
    if submission.is_none() {
        info!("No ATS configured, preparing applications only");
    }

    let runner = Runner {
        source: &source,
        extractor: &extractor,
        enricher: &enricher,
        reconciler: &reconciler,
        fallback: &fallback,
        results: &results,
        politeness: config.politeness,
        submission,
    };

    let report = runner.run(request);
    if report.robots_blocked {
        return Err(ApplyError::RobotsDisallowed(search_path).into());
    }
    Ok(report)
}

fn print_report(report: &RunReport) {
    println!("\nResults:");
    println!("  Pages fetched:   {}", report.pages_fetched);
    if report.pages_failed > 0 {
        println!("  Pages failed:    {}", report.pages_failed);
    }
    println!("  Offers:          {}", report.offers.len());
    println!("  Created:         {}", report.created);
    println!("  Updated:         {}", report.updated);
    println!("  Already present: {}", report.exists);
    if report.submitted > 0 {
        println!("  Submitted:       {}", report.submitted);
    }
    if report.failed > 0 {
        println!("  Saved locally:   {} (remote store failed)", report.failed);
    }
    if report.invalid > 0 {
        println!("  Skipped:         {} (no link or title)", report.invalid);
    }
}

fn print_saved(store: &LocalStore, letters: bool) {
    let offers = store.load();
    if offers.is_empty() {
        println!("No offers saved in {}.", store.path().display());
        return;
    }

    println!("{:<4} {:<10} {:<30} {:<20} {:<20}", "#", "STATUS", "TITLE", "COMPANY", "LOCATION");
    println!("{}", "-".repeat(88));
    for (i, offer) in offers.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<30} {:<20} {:<20}",
            i + 1,
            offer.status,
            truncate(&offer.title, 28),
            truncate(offer.company.as_deref().unwrap_or("-"), 18),
            truncate(offer.location.as_deref().unwrap_or("-"), 18)
        );
        if letters {
            if let Some(link) = &offer.link {
                println!("     {}", link);
            }
            if let Some(letter) = &offer.cover_letter {
                println!("\n{}\n", textwrap::indent(&textwrap::fill(letter, 76), "     "));
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
