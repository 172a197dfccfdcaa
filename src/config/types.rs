use serde::Deserialize;
use std::time::Duration;

/// Default site root
pub const DEFAULT_BASE_URL: &str = "https://arxiv.org";

/// Default license text written with every record
pub const DEFAULT_LICENSE: &str = "arXiv.org perpetual, non-exclusive license";

/// Categories in scan order. The first eight keep their historical order so a
/// resumed run retraces the same path.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "cs.AI", "cs.LG", "cs.CL", "cs.CV", "cs.SE", "cs.PL", "stat.ML", "math.OC",
    "cs.NE", "cs.IR", "cs.CY", "cs.DS", "cs.CR", "cs.CC", "cs.GT", "cs.RO",
    "cs.SI", "cs.HC", "math.ST", "stat.TH", "eess.AS", "eess.IV", "cs.SY", "cs.ET",
    "cs.AR", "cs.DB", "cs.DC", "cs.DM", "cs.FL", "cs.GL", "cs.GR", "cs.HO",
    "cs.IT", "cs.LO", "cs.MA", "cs.MM", "cs.MS", "cs.NA", "cs.NI", "cs.OH",
    "cs.OS", "cs.SD", "math.PR", "math.SP", "math.CO", "math.AP", "math.CA", "math.AT",
    "math.DG", "math.FA", "cs.SC", "cs.TC", "math.AG", "math.CT", "math.GN", "math.GR",
    "math.GT", "math.HO", "math.KT", "math.MG", "math.MP", "math.NT", "math.QA", "math.RA",
    "math.RT", "math.SG", "physics.ao-ph", "physics.app-ph", "physics.bio-ph",
    "physics.class-ph", "physics.comp-ph", "physics.data-an", "physics.flu-dyn",
    "physics.gen-ph", "physics.ins-det", "physics.optics", "physics.soc-ph",
    "physics.space-ph", "q-bio.BM", "q-bio.CB", "q-bio.GN", "q-bio.MN", "q-bio.NC",
    "q-bio.OT", "q-bio.PE", "q-bio.QM", "q-bio.SC", "q-bio.TO", "q-fin.CP", "q-fin.GN",
    "q-fin.MF", "q-fin.PM", "q-fin.PR", "q-fin.RM", "q-fin.ST", "q-fin.TR", "stat.AP",
    "stat.CO", "stat.ME", "stat.OT", "eess.SP", "eess.SY", "astro-ph.CO", "astro-ph.EP",
    "astro-ph.GA", "astro-ph.HE", "astro-ph.IM", "astro-ph.SR", "cond-mat.dis-nn",
    "cond-mat.mes-hall", "cond-mat.mtrl-sci", "cond-mat.other", "cond-mat.quant-gas",
    "cond-mat.soft", "cond-mat.stat-mech", "cond-mat.str-el", "cond-mat.supr-con",
    "gr-qc", "hep-ex", "hep-lat", "hep-ph", "hep-th", "math-ph", "nlin.AO", "nlin.CD",
    "nlin.CG", "nlin.PS", "nlin.SI", "nucl-ex", "nucl-th",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

/// Crawl scope and pacing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Root URL of the harvested site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Total number of records the output store should hold
    pub target: u64,

    /// Categories to scan, in order
    pub categories: Vec<String>,

    /// Multiplier applied to every sleep (pacing, backoff, cooldown)
    #[serde(rename = "delay-scale")]
    pub delay_scale: f64,

    /// Rebuild the session after this many records in the running total
    #[serde(rename = "rotate-session-every")]
    pub rotate_session_every: u64,

    /// Hard ceiling on fetches issued while scanning one category
    #[serde(rename = "max-requests-per-category")]
    pub max_requests_per_category: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            target: 3000,
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            delay_scale: 1.0,
            rotate_session_every: 100,
            max_requests_per_category: 1000,
        }
    }
}

/// Network fetch configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on a single network call (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Attempts per logical fetch before giving up
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_attempts: 5,
        }
    }
}

/// Output store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the CSV output store
    pub path: String,

    /// Flush once this many records are buffered
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Flush once this many seconds passed since the last flush
    #[serde(rename = "save-interval-secs")]
    pub save_interval_secs: u64,

    /// License text written with every record
    pub license: String,
}

impl OutputConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "data/raw/human_abstracts.csv".to_string(),
            batch_size: 25,
            save_interval_secs: 30,
            license: DEFAULT_LICENSE.to_string(),
        }
    }
}
