use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config;
use crate::models::{JobListing, JobStatus, StoredJob};

/// The three operations discovery and scoring need from persistence.
pub trait ListingStore {
    /// URLs from `urls` not yet stored, in input order.
    fn get_new_jobs(&self, urls: &[String]) -> Result<Vec<String>>;
    /// Inserts listings whose URL is unknown; returns rows inserted.
    fn add_jobs(&self, listings: &[JobListing]) -> Result<usize>;
    /// Records scores for known ids; returns rows modified.
    fn update_scores(&self, scores: &[(String, f64)]) -> Result<usize>;
}

pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
    remote: String,
}

// SQLite's default SQLITE_MAX_VARIABLE_NUMBER on older builds.
const MAX_PARAMS: usize = 999;

impl Database {
    /// Opens (creating if needed) the store at `path`. Every row inserted
    /// through this handle is stamped with `remote`.
    pub fn open(path: &Path, remote: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory: {}", parent.display())
                })?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Self {
            conn,
            path: Some(path.to_path_buf()),
            remote: remote.to_string(),
        };
        db.init()?;
        Ok(db)
    }

    pub fn open_default(remote: &str) -> Result<Self> {
        Self::open(&config::default_db_path(), remote)
    }

    pub fn open_in_memory(remote: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: None,
            remote: remote.to_string(),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates the schema, drops duplicate URLs (earliest row survives) and
    /// enforces URL uniqueness. Safe to run on every open.
    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                url TEXT UNIQUE,
                title TEXT,
                company TEXT,
                date_posted DATE,
                location TEXT,
                remote TEXT,
                status TEXT DEFAULT 'discovered',
                relevance_score REAL
            );

            DELETE FROM jobs
            WHERE rowid NOT IN (
                SELECT MIN(rowid) FROM jobs GROUP BY url
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_jobs_url ON jobs(url);
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            "#,
            )
            .context("Failed to initialize jobs schema")?;
        Ok(())
    }

    // --- Job operations ---

    pub fn get_new_jobs(&self, urls: &[String]) -> Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut existing: HashSet<String> = HashSet::new();
        for chunk in urls.chunks(MAX_PARAMS) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("SELECT url FROM jobs WHERE url IN ({})", placeholders);
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            for row in rows {
                existing.insert(row?);
            }
        }

        Ok(urls
            .iter()
            .filter(|url| !existing.contains(*url))
            .cloned()
            .collect())
    }

    pub fn add_jobs(&self, listings: &[JobListing]) -> Result<usize> {
        if listings.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO jobs (id, url, title, company, date_posted, location, remote)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for job in listings {
                inserted += stmt.execute(params![
                    job.id,
                    job.job_url,
                    job.title,
                    job.company,
                    job.date_posted,
                    job.location,
                    self.remote,
                ])?;
            }
        }
        tx.commit().context("Failed to commit new jobs")?;
        Ok(inserted)
    }

    pub fn update_scores<S: AsRef<str>>(&self, scores: &[(S, f64)]) -> Result<usize> {
        if scores.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE jobs SET relevance_score = ?1, status = ?2 WHERE id = ?3",
            )?;
            for (job_id, score) in scores {
                updated += stmt.execute(params![score, JobStatus::Scored, job_id.as_ref()])?;
            }
        }
        tx.commit().context("Failed to commit relevance scores")?;
        Ok(updated)
    }

    pub fn get_job(&self, id: &str) -> Result<Option<StoredJob>> {
        self.conn
            .query_row(
                "SELECT id, url, title, company, date_posted, location, remote, status, relevance_score
                 FROM jobs WHERE id = ?1",
                [id],
                Self::row_to_job,
            )
            .optional()
            .context("Failed to load job")
    }

    pub fn list_jobs(&self, status: Option<JobStatus>) -> Result<Vec<StoredJob>> {
        let mut sql = String::from(
            "SELECT id, url, title, company, date_posted, location, remote, status, relevance_score
             FROM jobs",
        );
        if status.is_some() {
            sql.push_str(" WHERE status = ?1");
        }
        sql.push_str(" ORDER BY relevance_score IS NULL, relevance_score DESC, rowid");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = if let Some(s) = status {
            stmt.query_map([s], Self::row_to_job)?
        } else {
            stmt.query_map([], Self::row_to_job)?
        };

        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list jobs")
    }

    pub fn count_jobs(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<StoredJob> {
        Ok(StoredJob {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            company: row.get(3)?,
            date_posted: row.get(4)?,
            location: row.get(5)?,
            remote: row.get(6)?,
            status: row
                .get::<_, Option<JobStatus>>(7)?
                .unwrap_or(JobStatus::Discovered),
            relevance_score: row.get(8)?,
        })
    }
}

impl ListingStore for Database {
    fn get_new_jobs(&self, urls: &[String]) -> Result<Vec<String>> {
        Database::get_new_jobs(self, urls)
    }

    fn add_jobs(&self, listings: &[JobListing]) -> Result<usize> {
        Database::add_jobs(self, listings)
    }

    fn update_scores(&self, scores: &[(String, f64)]) -> Result<usize> {
        Database::update_scores(self, scores)
    }
}
