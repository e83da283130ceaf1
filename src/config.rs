use std::path::PathBuf;
use std::time::Duration;

/// Knobs for the browser-driven components.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// WebDriver endpoint (geckodriver, chromedriver, selenium).
    pub webdriver_url: String,
    pub headless: bool,
    /// Page load budget for each navigation.
    pub navigation_timeout: Duration,
    /// How long to wait for the results list to render.
    pub results_timeout: Duration,
    /// How long to look for the sign-in interstitial before moving on.
    pub modal_timeout: Duration,
    /// Pause after dismissing the interstitial while it fades out.
    pub modal_settle: Duration,
    /// Render wait on a job detail page before extracting text.
    pub page_settle: Duration,
    /// Pause between detail pages.
    pub page_delay: Duration,
    /// Cap on listings parsed from one results page, whatever the caller asks for.
    pub result_limit: usize,
    /// Where to drop screenshots when a results page yields nothing.
    pub debug_dir: Option<PathBuf>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            headless: true,
            navigation_timeout: Duration::from_secs(30),
            results_timeout: Duration::from_secs(20),
            modal_timeout: Duration::from_secs(5),
            modal_settle: Duration::from_secs(1),
            page_settle: Duration::from_secs(10),
            page_delay: Duration::from_millis(1500),
            result_limit: 100,
            debug_dir: None,
        }
    }
}

impl ScraperConfig {
    /// Zero waits and short timeouts, for driving a fake browser.
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(1),
            results_timeout: Duration::from_secs(1),
            modal_timeout: Duration::ZERO,
            modal_settle: Duration::ZERO,
            page_settle: Duration::ZERO,
            page_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

pub fn default_db_path() -> PathBuf {
    // Use XDG data directory or fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "jobscout") {
        proj_dirs.data_dir().join("jobs.db")
    } else {
        PathBuf::from("jobs.db")
    }
}
