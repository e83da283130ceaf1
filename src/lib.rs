//! Job discovery and de-duplication: scrape search results, keep what has
//! never been seen, and record relevance scores produced elsewhere.

pub mod browser;
pub mod canonical;
pub mod config;
pub mod db;
pub mod descriptions;
pub mod discovery;
pub mod filters;
pub mod models;
pub mod observe;
pub mod pipeline;
pub mod scoring;
