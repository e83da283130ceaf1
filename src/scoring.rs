//! Interfaces to the external relevance scorer.
//!
//! Scores are produced elsewhere (an LLM service); this module only batches
//! listings out, validates what comes back and turns it into store updates.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::JobListing;
use crate::observe::{DiscoveryObserver, ScrapeEvent};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Structured candidate profile extracted upstream from a resume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateProfile {
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub experience_level: String,
    pub must_haves: Vec<String>,
    pub location: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobScore {
    pub job_id: String,
    pub relevance_score: i64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobScoreBatch {
    #[serde(default)]
    pub scores: Vec<JobScore>,
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    async fn score_batch(
        &self,
        profile: &CandidateProfile,
        jobs: &[JobListing],
    ) -> Result<JobScoreBatch>;
}

/// Scores `listings` in batches of `batch_size`. A failed batch is reported
/// and skipped; scores outside 0-100, for ids that were not in the batch, or
/// repeated within a batch are dropped.
pub async fn collect_scores(
    scorer: &dyn RelevanceScorer,
    profile: &CandidateProfile,
    listings: &[JobListing],
    batch_size: usize,
    observer: &dyn DiscoveryObserver,
) -> Vec<JobScore> {
    let mut collected = Vec::new();

    for (batch_index, batch) in listings.chunks(batch_size.max(1)).enumerate() {
        let result = match scorer.score_batch(profile, batch).await {
            Ok(result) => result,
            Err(e) => {
                observer.record(ScrapeEvent::ScoreBatchFailed {
                    batch: batch_index,
                    error: format!("{:#}", e),
                });
                continue;
            }
        };

        let expected: HashSet<&str> = batch.iter().map(|job| job.id.as_str()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        for score in result.scores {
            let reason = if !expected.contains(score.job_id.as_str()) {
                Some("job id not in batch".to_string())
            } else if !(0..=100).contains(&score.relevance_score) {
                Some(format!("score {} out of range", score.relevance_score))
            } else if !seen.insert(score.job_id.clone()) {
                Some("duplicate score in batch".to_string())
            } else {
                None
            };

            match reason {
                Some(reason) => observer.record(ScrapeEvent::ScoreDropped {
                    job_id: score.job_id,
                    reason,
                }),
                None => collected.push(score),
            }
        }
    }

    collected
}

/// The `(id, score)` pairs the store persists.
pub fn score_pairs(scores: &[JobScore]) -> Vec<(String, f64)> {
    scores
        .iter()
        .map(|s| (s.job_id.clone(), s.relevance_score as f64))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::observe::RecordingObserver;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Scores every job by title length; fails the batches listed.
    pub(crate) struct StubScorer {
        pub fail_batches: Vec<usize>,
        pub calls: Mutex<usize>,
    }

    impl StubScorer {
        pub(crate) fn new() -> Self {
            Self {
                fail_batches: Vec::new(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl RelevanceScorer for StubScorer {
        async fn score_batch(
            &self,
            _profile: &CandidateProfile,
            jobs: &[JobListing],
        ) -> Result<JobScoreBatch> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls - 1
            };
            if self.fail_batches.contains(&call) {
                return Err(anyhow!("model returned malformed JSON"));
            }
            Ok(JobScoreBatch {
                scores: jobs
                    .iter()
                    .map(|job| JobScore {
                        job_id: job.id.clone(),
                        relevance_score: job.display_title().len() as i64,
                        reasoning: "title length".to_string(),
                    })
                    .collect(),
            })
        }
    }

    struct FixedScorer(JobScoreBatch);

    #[async_trait]
    impl RelevanceScorer for FixedScorer {
        async fn score_batch(
            &self,
            _profile: &CandidateProfile,
            _jobs: &[JobListing],
        ) -> Result<JobScoreBatch> {
            Ok(self.0.clone())
        }
    }

    fn jobs(n: usize) -> Vec<JobListing> {
        (0..n)
            .map(|i| JobListing::new(&format!("https://example.com/jobs/{}", i)).with_title("Engineer"))
            .collect()
    }

    #[tokio::test]
    async fn test_failed_batch_is_skipped() {
        let scorer = StubScorer {
            fail_batches: vec![1],
            calls: Mutex::new(0),
        };
        let observer = RecordingObserver::new();
        let listings = jobs(5);

        let scores = collect_scores(&scorer, &CandidateProfile::default(), &listings, 2, &observer).await;

        let ids: Vec<_> = scores.iter().map(|s| s.job_id.clone()).collect();
        assert_eq!(ids, vec![listings[0].id.clone(), listings[1].id.clone(), listings[4].id.clone()]);
        assert_eq!(*scorer.calls.lock().unwrap(), 3);
        assert_eq!(
            observer.count(|e| matches!(e, ScrapeEvent::ScoreBatchFailed { batch: 1, .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_invalid_scores_dropped() {
        let listings = jobs(2);
        let score = |id: &str, value: i64| JobScore {
            job_id: id.to_string(),
            relevance_score: value,
            reasoning: String::new(),
        };
        let scorer = FixedScorer(JobScoreBatch {
            scores: vec![
                score(&listings[0].id, 87),
                score(&listings[0].id, 12),
                score(&listings[1].id, 140),
                score("made-up", 50),
            ],
        });
        let observer = RecordingObserver::new();

        let scores = collect_scores(&scorer, &CandidateProfile::default(), &listings, 10, &observer).await;

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].relevance_score, 87);
        assert_eq!(
            observer.count(|e| matches!(e, ScrapeEvent::ScoreDropped { .. })),
            3
        );
    }

    #[test]
    fn test_score_batch_wire_format() {
        let json = r#"{"scores": [{"job_id": "abc123", "relevance_score": 87, "reasoning": "Strong Rust match."}, {"job_id": "def", "relevance_score": 10}]}"#;
        let batch: JobScoreBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.scores.len(), 2);
        assert_eq!(batch.scores[1].reasoning, "");
        assert_eq!(
            score_pairs(&batch.scores),
            vec![("abc123".to_string(), 87.0), ("def".to_string(), 10.0)]
        );
    }

    #[test]
    fn test_profile_fields_default() {
        let profile: CandidateProfile =
            serde_json::from_str(r#"{"technical_skills": ["rust"], "location": "Berlin"}"#).unwrap();
        assert_eq!(profile.technical_skills, vec!["rust".to_string()]);
        assert!(profile.soft_skills.is_empty());
        assert_eq!(profile.experience_level, "");
    }
}
