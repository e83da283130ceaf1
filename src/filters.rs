use serde::{Deserialize, Serialize};
use url::Url;

pub const SEARCH_BASE_URL: &str = "https://www.linkedin.com/jobs/search";

const JOB_TYPE_CODES: &[(&str, &str)] = &[
    ("full-time", "F"),
    ("part-time", "P"),
    ("contract", "C"),
    ("temporary", "T"),
    ("volunteer", "V"),
];

const EXPERIENCE_LEVEL_CODES: &[(&str, &str)] = &[
    ("internship", "1"),
    ("entry level", "2"),
    ("associate", "3"),
    ("mid-senior level", "4"),
    ("director", "5"),
];

const REMOTE_CODES: &[(&str, &str)] = &[("on-site", "1"), ("remote", "2"), ("hybrid", "3")];

/// Free-text filter tags as produced upstream (profile, CLI flags).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub job_type: Vec<String>,
    #[serde(default)]
    pub experience_level: Vec<String>,
    #[serde(default)]
    pub remote: Vec<String>,
}

impl SearchFilters {
    pub fn job_type_codes(&self) -> Vec<&'static str> {
        map_tags(&self.job_type, JOB_TYPE_CODES)
    }

    pub fn experience_level_codes(&self) -> Vec<&'static str> {
        map_tags(&self.experience_level, EXPERIENCE_LEVEL_CODES)
    }

    pub fn remote_codes(&self) -> Vec<&'static str> {
        map_tags(&self.remote, REMOTE_CODES)
    }
}

/// Trims and lowercases tags, dropping blanks.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Maps tags through a vocabulary. Unknown tags are dropped; repeated codes
/// are kept once, in first-seen order.
fn map_tags(tags: &[String], vocabulary: &[(&str, &'static str)]) -> Vec<&'static str> {
    let mut codes: Vec<&'static str> = Vec::new();
    for tag in normalize_tags(tags) {
        if let Some((_, code)) = vocabulary.iter().find(|(name, _)| *name == tag) {
            if !codes.contains(code) {
                codes.push(*code);
            }
        }
    }
    codes
}

/// Builds the results-page URL for one query. Spaces encode as `+`.
pub fn build_search_url(query: &str, location: &str, filters: &SearchFilters) -> String {
    let mut params: Vec<(&str, String)> = vec![
        ("keywords", query.to_string()),
        ("location", location.to_string()),
    ];

    let job_type = filters.job_type_codes();
    if !job_type.is_empty() {
        params.push(("f_JT", job_type.join(",")));
    }
    let experience = filters.experience_level_codes();
    if !experience.is_empty() {
        params.push(("f_E", experience.join(",")));
    }
    let remote = filters.remote_codes();
    if !remote.is_empty() {
        params.push(("f_WT", remote.join(",")));
    }

    match Url::parse_with_params(SEARCH_BASE_URL, &params) {
        Ok(url) => url.to_string(),
        // SEARCH_BASE_URL always parses
        Err(_) => SEARCH_BASE_URL.to_string(),
    }
}
