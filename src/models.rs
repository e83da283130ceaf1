use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::canonical::{canonicalize, derive_id};

/// A discovered posting, as handed between pipeline phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub id: String, // md5 of job_url
    pub title: Option<String>,
    pub company: Option<String>,
    pub job_url: String, // canonical
    pub location: Option<String>,
    pub description: Option<String>,
    pub date_posted: Option<NaiveDate>,
}

impl JobListing {
    /// Builds a listing from a raw (possibly tracked) URL. The URL is
    /// canonicalized and the id derived from it, so `id == derive_id(job_url)`
    /// holds for every listing built this way.
    pub fn new(raw_url: &str) -> Self {
        let job_url = canonicalize(raw_url);
        Self {
            id: derive_id(&job_url),
            title: None,
            company: None,
            job_url,
            location: None,
            description: None,
            date_posted: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_date_posted(mut self, date: NaiveDate) -> Self {
        self.date_posted = Some(date);
        self
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(untitled)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Discovered,
    Scored,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Discovered => "discovered",
            JobStatus::Scored => "scored",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "discovered" => Ok(JobStatus::Discovered),
            "scored" => Ok(JobStatus::Scored),
            other => Err(anyhow::anyhow!(
                "Unknown job status '{}'. Expected: discovered, scored",
                other
            )),
        }
    }
}

impl ToSql for JobStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for JobStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse().map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
    }
}

/// A persisted row of the `jobs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub date_posted: Option<NaiveDate>,
    pub location: Option<String>,
    pub remote: Option<String>,
    pub status: JobStatus,
    pub relevance_score: Option<f64>,
}

impl StoredJob {
    /// Projects the row back into the value other phases work with.
    pub fn to_listing(&self) -> JobListing {
        JobListing {
            id: self.id.clone(),
            title: self.title.clone(),
            company: self.company.clone(),
            job_url: self.url.clone(),
            location: self.location.clone(),
            description: None,
            date_posted: self.date_posted,
        }
    }
}
