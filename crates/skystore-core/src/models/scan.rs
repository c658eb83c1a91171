//! Scan summary: computed once per dropbox scan and returned to the caller.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::asset::AssetCreationResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// True when every collected file was registered and the run was not cut short
    pub success: bool,
    pub files_processed: usize,
    pub successful_assets: usize,
    pub failed_assets: usize,
    /// Files whose result was never collected because the run was cancelled
    pub not_collected: usize,
    pub partial: bool,
    pub duration_secs: f64,
    /// Results in arrival order
    pub results: Vec<AssetCreationResult>,
}

impl ScanSummary {
    /// Summary of a run that found nothing to process.
    pub fn empty(duration: Duration) -> Self {
        Self::from_results(0, Vec::new(), duration, false)
    }

    pub fn from_results(
        files_processed: usize,
        results: Vec<AssetCreationResult>,
        duration: Duration,
        partial: bool,
    ) -> Self {
        let successful_assets = results.iter().filter(|r| r.is_success()).count();
        let failed_assets = results.len() - successful_assets;
        let not_collected = files_processed.saturating_sub(results.len());

        Self {
            success: failed_assets == 0 && !partial,
            files_processed,
            successful_assets,
            failed_assets,
            not_collected,
            partial,
            duration_secs: duration.as_secs_f64(),
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssetCreationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary() {
        let summary = ScanSummary::empty(Duration::from_millis(250));
        assert!(summary.success);
        assert_eq!(summary.files_processed, 0);
        assert_eq!(summary.successful_assets, 0);
        assert_eq!(summary.failed_assets, 0);
        assert_eq!(summary.duration_secs, 0.25);
    }

    #[test]
    fn counts_successes_and_failures() {
        let results = vec![
            AssetCreationResult::created("dropbox/u1/a.jpg", "a"),
            AssetCreationResult::failed("dropbox/u1/b.jpg", "500"),
            AssetCreationResult::created("dropbox/u2/c.jpg", "c"),
        ];
        let summary = ScanSummary::from_results(3, results, Duration::ZERO, false);
        assert!(!summary.success);
        assert_eq!(summary.successful_assets, 2);
        assert_eq!(summary.failed_assets, 1);
        assert_eq!(summary.not_collected, 0);
        let failures: Vec<_> = summary.failures().map(|r| r.file_name.as_str()).collect();
        assert_eq!(failures, vec!["b.jpg"]);
    }

    #[test]
    fn partial_run_is_not_successful() {
        let results = vec![AssetCreationResult::created("dropbox/u1/a.jpg", "a")];
        let summary = ScanSummary::from_results(4, results, Duration::ZERO, true);
        assert!(!summary.success);
        assert!(summary.partial);
        assert_eq!(summary.not_collected, 3);
    }
}
