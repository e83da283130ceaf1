use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use jobscout::browser::WebDriverLauncher;
use jobscout::config::{self, ScraperConfig};
use jobscout::db::Database;
use jobscout::descriptions::DescriptionFetcher;
use jobscout::discovery::LinkedInScraper;
use jobscout::filters::SearchFilters;
use jobscout::models::JobStatus;
use jobscout::observe::TracingObserver;
use jobscout::pipeline::{run_discovery, DiscoveryRequest};
use jobscout::scoring::{score_pairs, JobScoreBatch};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "Discover job listings, skip the ones already seen, track relevance scores")]
struct Cli {
    /// Path to the job database (defaults to the platform data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Remote tag stamped on newly stored jobs
    #[arg(long, global = true, default_value = "")]
    remote_tag: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Search for each query and store the listings not seen before
    Discover {
        /// Search queries, one search per query
        #[arg(required = true)]
        queries: Vec<String>,

        /// Location to search in
        #[arg(short, long, default_value = "")]
        location: String,

        /// Job type filter (full-time, part-time, contract, temporary, volunteer)
        #[arg(long = "job-type")]
        job_type: Vec<String>,

        /// Experience level filter (internship, "entry level", associate, "mid-senior level", director)
        #[arg(long = "experience")]
        experience_level: Vec<String>,

        /// Workplace filter (on-site, remote, hybrid)
        #[arg(long)]
        remote: Vec<String>,

        /// Maximum listings per query
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,

        /// WebDriver endpoint
        #[arg(long, default_value = "http://localhost:4444")]
        webdriver: String,

        /// Show the browser window
        #[arg(long)]
        headed: bool,

        /// Save a screenshot here when a results page yields nothing
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },

    /// List stored jobs
    List {
        /// Filter by status (discovered, scored)
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show job details
    Show {
        /// Job ID
        id: String,
    },

    /// Fetch full descriptions for unscored jobs and print them as JSON
    Describe {
        /// Maximum number of jobs to visit
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// WebDriver endpoint
        #[arg(long, default_value = "http://localhost:4444")]
        webdriver: String,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Record scores from a JSON file ({"scores": [{"job_id", "relevance_score", "reasoning"}]})
    ImportScores {
        /// Path to the score batch
        file: PathBuf,
    },
}

fn open_db(path: Option<&PathBuf>, remote: &str) -> Result<Database> {
    match path {
        Some(path) => Database::open(path, remote),
        None => Database::open_default(remote),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = open_db(cli.db.as_ref(), &cli.remote_tag)?;

    match cli.command {
        Commands::Init => {
            let location = db
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| config::default_db_path().display().to_string());
            println!("Database initialized at {}", location);
        }

        Commands::Discover {
            queries,
            location,
            job_type,
            experience_level,
            remote,
            limit,
            webdriver,
            headed,
            debug_dir,
        } => {
            let scraper_config = ScraperConfig {
                webdriver_url: webdriver,
                headless: !headed,
                result_limit: limit,
                debug_dir,
                ..ScraperConfig::default()
            };
            let observer = Arc::new(TracingObserver);
            let launcher = Arc::new(WebDriverLauncher::from_config(&scraper_config));
            let scraper = LinkedInScraper::new(launcher, scraper_config, observer.clone());

            let request = DiscoveryRequest {
                queries,
                location,
                filters: SearchFilters {
                    job_type,
                    experience_level,
                    remote,
                },
                limit,
            };

            let outcome = run_discovery(&scraper, &db, &request, observer.as_ref()).await?;

            println!("{:<30} {:>8} {:>6} {:>9}", "QUERY", "SCRAPED", "NEW", "INSERTED");
            println!("{}", "-".repeat(56));
            for report in &outcome.per_query {
                println!(
                    "{:<30} {:>8} {:>6} {:>9}",
                    truncate(&report.query, 28),
                    report.scraped,
                    report.new,
                    report.inserted
                );
            }

            if outcome.listings.is_empty() {
                println!("\nNo new jobs found.");
            } else {
                println!("\nNew jobs ({}):", outcome.listings.len());
                for job in &outcome.listings {
                    println!(
                        "  {} - {} ({})",
                        short_id(&job.id),
                        job.display_title(),
                        job.company.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::List { status } => {
            let status = status
                .as_deref()
                .map(str::parse::<JobStatus>)
                .transpose()?;
            let jobs = db.list_jobs(status)?;
            if jobs.is_empty() {
                println!("No jobs found.");
            } else {
                println!("{:<10} {:<11} {:<30} {:<20} {:>6}", "ID", "STATUS", "TITLE", "COMPANY", "SCORE");
                println!("{}", "-".repeat(81));
                for job in jobs {
                    let score = job
                        .relevance_score
                        .map(|s| format!("{:.0}", s))
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<10} {:<11} {:<30} {:<20} {:>6}",
                        short_id(&job.id),
                        job.status,
                        truncate(job.title.as_deref().unwrap_or("(untitled)"), 28),
                        truncate(job.company.as_deref().unwrap_or_default(), 18),
                        score
                    );
                }
            }
        }

        Commands::Show { id } => match db.get_job(&id)? {
            Some(job) => {
                println!("Job {}", job.id);
                println!("Title: {}", job.title.as_deref().unwrap_or("(untitled)"));
                if let Some(company) = &job.company {
                    println!("Company: {}", company);
                }
                if let Some(location) = &job.location {
                    println!("Location: {}", location);
                }
                if let Some(date) = job.date_posted {
                    println!("Posted: {}", date);
                }
                println!("Status: {}", job.status);
                if let Some(score) = job.relevance_score {
                    println!("Score: {:.0}", score);
                }
                println!("URL: {}", job.url);
            }
            None => {
                println!("Job {} not found.", id);
            }
        },

        Commands::Describe {
            limit,
            webdriver,
            headed,
        } => {
            let listings: Vec<_> = db
                .list_jobs(Some(JobStatus::Discovered))?
                .iter()
                .take(limit)
                .map(|job| job.to_listing())
                .collect();
            if listings.is_empty() {
                println!("No unscored jobs.");
                return Ok(());
            }

            let scraper_config = ScraperConfig {
                webdriver_url: webdriver,
                headless: !headed,
                ..ScraperConfig::default()
            };
            let launcher = Arc::new(WebDriverLauncher::from_config(&scraper_config));
            let fetcher = DescriptionFetcher::new(launcher, scraper_config, Arc::new(TracingObserver));

            let descriptions = fetcher.scrape_job_descriptions(&listings).await;
            let enriched: Vec<_> = listings
                .into_iter()
                .map(|mut job| {
                    if let Some(text) = descriptions.get(&job.id) {
                        job.description = Some(text.clone());
                    }
                    job
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&enriched)?);
        }

        Commands::ImportScores { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read scores file: {}", file.display()))?;
            let batch: JobScoreBatch = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid score batch in {}", file.display()))?;

            if let Some(bad) = batch
                .scores
                .iter()
                .find(|s| !(0..=100).contains(&s.relevance_score))
            {
                return Err(anyhow!(
                    "Score {} for job {} is outside 0-100",
                    bad.relevance_score,
                    bad.job_id
                ));
            }

            let updated = db.update_scores(&score_pairs(&batch.scores))?;
            println!(
                "Recorded {} of {} score(s).",
                updated,
                batch.scores.len()
            );
        }
    }

    Ok(())
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
