//! Report aggregation across runs.
//!
//! Every report file present in run 0 is looked up in each run directory,
//! the tracked fields are extracted, and their means become one summary
//! record per site. The summary file is rewritten after every record.

use crate::error::{ReportError, Result};
use crate::models::{RunMetrics, ScalePolicy, SummaryRecord, UrlField, JSON_EXT};
use crate::report::write_json_summary;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PERFORMANCE: &str = "/categories/performance/score";
const ACCESSIBILITY: &str = "/categories/accessibility/score";
const BEST_PRACTICES: &str = "/categories/best-practices/score";
const SEO: &str = "/categories/seo/score";
const FIRST_MEANINGFUL_PAINT: &str = "/audits/first-meaningful-paint/numericValue";
const TIME_TO_INTERACTIVE: &str = "/audits/interactive/numericValue";

/// Aggregation settings.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub scale: ScalePolicy,
    pub url_field: UrlField,
    /// How many sites may have their reports read at once.
    pub read_concurrency: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            scale: ScalePolicy::default(),
            url_field: UrlField::default(),
            read_concurrency: 4,
        }
    }
}

/// What aggregation produced.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    /// Records in the order they were written.
    pub records: Vec<SummaryRecord>,
    /// Report filenames whose record was dropped.
    pub dropped: Vec<String>,
}

/// Arithmetic mean of an ordered sequence; `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Pull the tracked fields out of a parsed Lighthouse report.
pub fn extract_metrics(report: &Value, path: &Path, url_field: UrlField) -> Result<RunMetrics> {
    let number = |pointer: &str| -> Result<f64> {
        report
            .pointer(pointer)
            .and_then(Value::as_f64)
            .ok_or_else(|| ReportError::MissingField {
                path: path.to_path_buf(),
                field: pointer.to_string(),
            })
    };

    let url_pointers: &[&str] = match url_field {
        UrlField::Final => &["/finalUrl", "/finalDisplayedUrl"],
        UrlField::Requested => &["/requestedUrl"],
    };
    let url = url_pointers
        .iter()
        .find_map(|p| report.pointer(p).and_then(Value::as_str))
        .ok_or_else(|| ReportError::MissingField {
            path: path.to_path_buf(),
            field: url_pointers[0].to_string(),
        })?;

    Ok(RunMetrics {
        url: url.to_string(),
        performance: number(PERFORMANCE)?,
        accessibility: number(ACCESSIBILITY)?,
        best_practices: number(BEST_PRACTICES)?,
        seo: number(SEO)?,
        first_meaningful_paint: number(FIRST_MEANINGFUL_PAINT)?,
        time_to_interactive: number(TIME_TO_INTERACTIVE)?,
    })
}

/// Read and parse one report file.
pub async fn read_report(path: &Path, url_field: UrlField) -> Result<RunMetrics> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let report: Value = serde_json::from_slice(&bytes).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    extract_metrics(&report, path, url_field)
}

/// Average per-run metrics into a summary record.
///
/// The URL comes from the last run.
pub fn summarize(runs: &[RunMetrics], scale: ScalePolicy) -> Result<SummaryRecord> {
    let last = runs.last().ok_or(ReportError::NoRuns)?;

    let avg = |field: fn(&RunMetrics) -> f64| -> f64 {
        let values: Vec<f64> = runs.iter().map(field).collect();
        mean(&values).unwrap_or_default()
    };

    Ok(SummaryRecord {
        url: last.url.clone(),
        performance_avg: scale.score(avg(|m| m.performance)),
        accessibility_avg: scale.score(avg(|m| m.accessibility)),
        best_practices_avg: scale.score(avg(|m| m.best_practices)),
        seo_avg: scale.score(avg(|m| m.seo)),
        first_meaningful_paint_avg: scale.timing(avg(|m| m.first_meaningful_paint)),
        time_to_interactive_avg: scale.timing(avg(|m| m.time_to_interactive)),
    })
}

/// List JSON report filenames directly inside `dir`, sorted by name.
pub fn list_report_files(dir: &Path) -> Vec<String> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| name.ends_with(JSON_EXT))
        .collect()
}

/// Averages one batch directory into `summary.json`.
pub struct Aggregator {
    batch_dir: PathBuf,
    runs: usize,
    options: AggregateOptions,
}

impl Aggregator {
    pub fn new(batch_dir: impl Into<PathBuf>, runs: usize, options: AggregateOptions) -> Self {
        Self {
            batch_dir: batch_dir.into(),
            runs,
            options,
        }
    }

    /// Paths of `file` in every run directory, run 0 first.
    pub fn run_paths(&self, file: &str) -> Vec<PathBuf> {
        (0..self.runs)
            .map(|run| self.batch_dir.join(run.to_string()).join(file))
            .collect()
    }

    /// Build the summary record for one report filename.
    pub async fn aggregate_site(&self, file: &str) -> Result<SummaryRecord> {
        let mut metrics = Vec::with_capacity(self.runs);
        for path in self.run_paths(file) {
            debug!("Reading {}", path.display());
            metrics.push(read_report(&path, self.options.url_field).await?);
        }
        summarize(&metrics, self.options.scale)
    }

    /// Aggregate every site found in run 0, rewriting `summary_path` after
    /// each record. A site that fails is logged and skipped.
    pub async fn run(&self, summary_path: &Path) -> anyhow::Result<AggregateResult> {
        let run0 = self.batch_dir.join("0");
        if !run0.is_dir() {
            warn!("No reports found: {} does not exist", run0.display());
        }

        let files = list_report_files(&run0);
        info!("Aggregating {} report(s) across {} run(s)", files.len(), self.runs);

        let mut result = AggregateResult::default();
        write_json_summary(&result.records, summary_path)?;

        let mut pending = stream::iter(files)
            .map(|file| async move {
                let outcome = self.aggregate_site(&file).await;
                (file, outcome)
            })
            .buffered(self.options.read_concurrency.max(1));

        while let Some((file, outcome)) = pending.next().await {
            match outcome {
                Ok(record) => {
                    debug!("Summarized {} as {}", file, record.url);
                    result.records.push(record);
                    write_json_summary(&result.records, summary_path)?;
                }
                Err(e) => {
                    warn!("Dropping summary for {}: {}", file, e);
                    result.dropped.push(file);
                }
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE: &str = include_str!("../../fixtures/lighthouse-report.json");

    fn report(score: f64, fmp: f64, tti: f64) -> Value {
        json!({
            "requestedUrl": "https://example.com",
            "finalUrl": "https://example.com/",
            "categories": {
                "performance": { "score": score },
                "accessibility": { "score": score },
                "best-practices": { "score": score },
                "seo": { "score": score }
            },
            "audits": {
                "first-meaningful-paint": { "numericValue": fmp },
                "interactive": { "numericValue": tti }
            }
        })
    }

    fn write_report(batch: &Path, run: usize, file: &str, value: &Value) {
        let dir = batch.join(run.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(file), value.to_string()).unwrap();
    }

    fn read_summary(path: &Path) -> Vec<SummaryRecord> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[4.0]), Some(4.0));
        assert_eq!(mean(&[1.0, 0.5, 0.0]), Some(0.5));
    }

    #[test]
    fn test_extract_metrics_from_fixture() {
        let value: Value = serde_json::from_str(FIXTURE).unwrap();
        let metrics = extract_metrics(&value, Path::new("r.json"), UrlField::Final).unwrap();

        assert_eq!(metrics.url, "https://example.com/");
        assert_eq!(metrics.performance, 0.98);
        assert_eq!(metrics.accessibility, 0.88);
        assert_eq!(metrics.best_practices, 1.0);
        assert_eq!(metrics.seo, 0.9);
        assert_eq!(metrics.first_meaningful_paint, 1250.0);
        assert_eq!(metrics.time_to_interactive, 2500.0);
    }

    #[test]
    fn test_extract_metrics_requested_url() {
        let value: Value = serde_json::from_str(FIXTURE).unwrap();
        let metrics = extract_metrics(&value, Path::new("r.json"), UrlField::Requested).unwrap();
        assert_eq!(metrics.url, "https://example.com");
    }

    #[test]
    fn test_extract_metrics_final_displayed_fallback() {
        let mut value = report(1.0, 1.0, 1.0);
        let obj = value.as_object_mut().unwrap();
        obj.remove("finalUrl");
        obj.insert("finalDisplayedUrl".to_string(), json!("https://example.com/home"));

        let metrics = extract_metrics(&value, Path::new("r.json"), UrlField::Final).unwrap();
        assert_eq!(metrics.url, "https://example.com/home");
    }

    #[test]
    fn test_extract_metrics_null_score() {
        let mut value = report(1.0, 1.0, 1.0);
        value["categories"]["seo"]["score"] = Value::Null;

        let err = extract_metrics(&value, Path::new("r.json"), UrlField::Final).unwrap_err();
        assert!(matches!(err, ReportError::MissingField { ref field, .. } if field == SEO));
    }

    #[test]
    fn test_summarize_percent() {
        let runs: Vec<RunMetrics> = [1.0, 0.5, 0.0]
            .iter()
            .map(|&score| {
                let value = report(score, 1000.0, 3000.0);
                extract_metrics(&value, Path::new("r.json"), UrlField::Final).unwrap()
            })
            .collect();

        let record = summarize(&runs, ScalePolicy::Percent).unwrap();
        assert_eq!(record.performance_avg, 50.0);
        assert_eq!(record.seo_avg, 50.0);
        assert_eq!(record.first_meaningful_paint_avg, 1.0);
        assert_eq!(record.time_to_interactive_avg, 3.0);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["performanceAvg"], "50.00");
    }

    #[test]
    fn test_summarize_raw() {
        let value = report(0.5, 1200.0, 2400.0);
        let runs = vec![extract_metrics(&value, Path::new("r.json"), UrlField::Final).unwrap()];

        let record = summarize(&runs, ScalePolicy::Raw).unwrap();
        assert_eq!(record.performance_avg, 0.5);
        assert_eq!(record.first_meaningful_paint_avg, 1200.0);
    }

    #[test]
    fn test_summarize_no_runs() {
        assert!(matches!(
            summarize(&[], ScalePolicy::Percent),
            Err(ReportError::NoRuns)
        ));
    }

    #[test]
    fn test_list_report_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.report.json", "a.report.json", "a.report.html", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }

        assert_eq!(
            list_report_files(dir.path()),
            vec!["a.report.json", "b.report.json"]
        );
        assert!(list_report_files(&dir.path().join("missing")).is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_reads_every_run() {
        let dir = tempfile::tempdir().unwrap();
        let file = "example_com.report.json";
        for (run, score) in [1.0, 0.5, 0.0].iter().enumerate() {
            write_report(dir.path(), run, file, &report(*score, 1000.0, 2000.0));
        }

        let aggregator = Aggregator::new(dir.path(), 3, AggregateOptions::default());
        assert_eq!(aggregator.run_paths(file).len(), 3);

        let summary = dir.path().join("summary.json");
        let result = aggregator.run(&summary).await.unwrap();

        assert_eq!(result.records.len(), 1);
        assert!(result.dropped.is_empty());

        let written = read_summary(&summary);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].performance_avg, 50.0);
        assert_eq!(written[0].url, "https://example.com/");
    }

    #[tokio::test]
    async fn test_aggregate_drops_site_missing_from_later_run() {
        let dir = tempfile::tempdir().unwrap();
        let good = report(0.9, 1000.0, 2000.0);
        write_report(dir.path(), 0, "a_com.report.json", &good);
        write_report(dir.path(), 1, "a_com.report.json", &good);
        write_report(dir.path(), 0, "b_com.report.json", &good);

        let summary = dir.path().join("summary.json");
        let result = Aggregator::new(dir.path(), 2, AggregateOptions::default())
            .run(&summary)
            .await
            .unwrap();

        assert_eq!(result.dropped, vec!["b_com.report.json"]);
        let written = read_summary(&summary);
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].performance_avg, 90.0);
    }

    #[tokio::test]
    async fn test_aggregate_drops_malformed_report() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("0")).unwrap();
        std::fs::write(dir.path().join("0/bad.report.json"), "{ not json").unwrap();

        let summary = dir.path().join("summary.json");
        let result = Aggregator::new(dir.path(), 1, AggregateOptions::default())
            .run(&summary)
            .await
            .unwrap();

        assert!(result.records.is_empty());
        assert_eq!(result.dropped.len(), 1);
        assert!(read_summary(&summary).is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_without_run_directory_writes_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = dir.path().join("summary.json");

        let result = Aggregator::new(dir.path(), 2, AggregateOptions::default())
            .run(&summary)
            .await
            .unwrap();

        assert!(result.records.is_empty());
        assert!(read_summary(&summary).is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_commits_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c", "a", "b"] {
            let mut value = report(1.0, 1.0, 1.0);
            value["finalUrl"] = json!(format!("https://{}.com/", name));
            write_report(dir.path(), 0, &format!("{}_com.report.json", name), &value);
        }

        let options = AggregateOptions {
            read_concurrency: 3,
            ..Default::default()
        };
        let summary = dir.path().join("summary.json");
        let result = Aggregator::new(dir.path(), 1, options).run(&summary).await.unwrap();

        let urls: Vec<_> = result.records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/", "https://b.com/", "https://c.com/"]);
    }
}
