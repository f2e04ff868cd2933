use std::time::Duration;

/// Tunables for the assignment pipeline and its background watchdogs.
/// Defaults follow the timings spec.md names explicitly (`StuckCheckInterval`,
/// `StuckDetectionTimeout`, the 30 s drain quiescence window).
#[derive(Debug, Clone)]
pub struct JobManagerConfig {
    pub max_hashcat_retries: u32,
    pub hashcat_retry_delay: Duration,
    pub drain_quiescence: Duration,
    pub stuck_check_interval: Duration,
    pub stuck_detection_timeout: Duration,
    /// Prefer `rules/chunks/job_<id>/...` over the legacy shared chunk
    /// directory. Only false for agents pinned to a coordinator that
    /// predates per-job chunk scoping.
    pub use_jobdir_scoped_rules: bool,
}

impl Default for JobManagerConfig {
    fn default() -> Self {
        Self {
            max_hashcat_retries: 3,
            hashcat_retry_delay: Duration::from_secs(5),
            drain_quiescence: Duration::from_secs(30),
            stuck_check_interval: Duration::from_secs(30),
            stuck_detection_timeout: Duration::from_secs(120),
            use_jobdir_scoped_rules: true,
        }
    }
}
