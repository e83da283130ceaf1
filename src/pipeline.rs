use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::ListingStore;
use crate::descriptions::DescriptionFetcher;
use crate::discovery::JobSource;
use crate::filters::SearchFilters;
use crate::models::JobListing;
use crate::observe::{DiscoveryObserver, ScrapeEvent};
use crate::scoring::{collect_scores, score_pairs, CandidateProfile, JobScore, RelevanceScorer};

/// What the discovery phase needs from the strategy phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub queries: Vec<String>,
    pub location: String,
    #[serde(default)]
    pub filters: SearchFilters,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReport {
    pub query: String,
    pub scraped: usize,
    pub new: usize,
    pub inserted: usize,
}

/// Novel listings from one run, in first-seen order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryOutcome {
    pub listings: Vec<JobListing>,
    pub per_query: Vec<QueryReport>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub descriptions_found: usize,
    pub scores: Vec<JobScore>,
    pub updated: usize,
}

/// Runs every query through `source`, keeps listings the store has never
/// seen, persists them, and merges the survivors across queries.
///
/// A listing that shows up under several queries is persisted and returned
/// once, attributed to the first query that surfaced it. Only store errors
/// propagate; scraping failures just shrink the result.
pub async fn run_discovery(
    source: &dyn JobSource,
    store: &dyn ListingStore,
    request: &DiscoveryRequest,
    observer: &dyn DiscoveryObserver,
) -> Result<DiscoveryOutcome> {
    let mut outcome = DiscoveryOutcome::default();
    let mut seen_in_run: HashSet<String> = HashSet::new();

    for query in &request.queries {
        let scraped = source
            .search_jobs(query, &request.location, &request.filters, request.limit)
            .await;
        if scraped.is_empty() {
            observer.record(ScrapeEvent::QueryEmpty {
                query: query.clone(),
            });
            outcome.per_query.push(QueryReport {
                query: query.clone(),
                scraped: 0,
                new: 0,
                inserted: 0,
            });
            continue;
        }

        let scraped_count = scraped.len();
        let unseen: Vec<JobListing> = scraped
            .into_iter()
            .filter(|job| seen_in_run.insert(job.job_url.clone()))
            .collect();

        let urls: Vec<String> = unseen.iter().map(|job| job.job_url.clone()).collect();
        let fresh: HashSet<String> = store.get_new_jobs(&urls)?.into_iter().collect();
        let new_jobs: Vec<JobListing> = unseen
            .into_iter()
            .filter(|job| fresh.contains(&job.job_url))
            .collect();

        let inserted = if new_jobs.is_empty() {
            0
        } else {
            store.add_jobs(&new_jobs)?
        };

        observer.record(ScrapeEvent::ListingsPersisted {
            query: query.clone(),
            new: new_jobs.len(),
            inserted,
        });
        outcome.per_query.push(QueryReport {
            query: query.clone(),
            scraped: scraped_count,
            new: new_jobs.len(),
            inserted,
        });
        outcome.listings.extend(new_jobs);
    }

    Ok(outcome)
}

/// Fetches full descriptions, scores the listings in batches and records the
/// scores. Listings whose description could not be fetched are scored on
/// whatever snippet discovery captured.
pub async fn run_evaluation(
    fetcher: &DescriptionFetcher,
    scorer: &dyn RelevanceScorer,
    store: &dyn ListingStore,
    profile: &CandidateProfile,
    listings: &[JobListing],
    batch_size: usize,
    observer: &dyn DiscoveryObserver,
) -> Result<EvaluationOutcome> {
    if listings.is_empty() {
        return Ok(EvaluationOutcome::default());
    }

    let descriptions = fetcher.scrape_job_descriptions(listings).await;
    let enriched: Vec<JobListing> = listings
        .iter()
        .map(|job| {
            let mut job = job.clone();
            if let Some(text) = descriptions.get(&job.id) {
                job.description = Some(text.clone());
            }
            job
        })
        .collect();

    let scores = collect_scores(scorer, profile, &enriched, batch_size, observer).await;
    let updated = store.update_scores(&score_pairs(&scores))?;

    Ok(EvaluationOutcome {
        descriptions_found: descriptions.len(),
        scores,
        updated,
    })
}
