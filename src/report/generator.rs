//! Summary report generation.
//!
//! This module renders the per-site averages as the `summary.json` array
//! and, on request, as a Markdown table.

use crate::models::{ScalePolicy, SummaryMetadata, SummaryRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Generate the JSON summary: an array of records, 4-space indented.
pub fn generate_json_summary(records: &[SummaryRecord]) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut serializer)?;

    String::from_utf8(buf).context("Summary JSON was not valid UTF-8")
}

/// Overwrite `path` with the JSON summary.
pub fn write_json_summary(records: &[SummaryRecord], path: &Path) -> Result<()> {
    let content = generate_json_summary(records)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}

/// Generate a Markdown rendering of the summary.
pub fn generate_markdown_summary(metadata: &SummaryMetadata, records: &[SummaryRecord]) -> String {
    let mut output = String::new();

    output.push_str("# Lighthouse Batch Summary\n\n");
    output.push_str(&generate_metadata_section(metadata, records.len()));
    output.push_str(&generate_table(metadata.scale, records));

    output
}

/// Write the Markdown summary to a file.
pub fn write_markdown_summary(
    metadata: &SummaryMetadata,
    records: &[SummaryRecord],
    path: &Path,
) -> Result<()> {
    let content = generate_markdown_summary(metadata, records);
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write Markdown summary to {}", path.display()))
}

fn generate_metadata_section(metadata: &SummaryMetadata, record_count: usize) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Batch:** {}\n", metadata.batch_name));
    section.push_str(&format!("- **Runs:** {}\n", metadata.runs));
    section.push_str(&format!(
        "- **Sites Summarized:** {} of {}\n",
        record_count, metadata.sites
    ));
    section.push_str(&format!("- **Scale:** {}\n", metadata.scale));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

fn generate_table(scale: ScalePolicy, records: &[SummaryRecord]) -> String {
    if records.is_empty() {
        return "No summary records were produced.\n".to_string();
    }

    let (score_unit, time_unit) = match scale {
        ScalePolicy::Percent => ("%", "s"),
        ScalePolicy::Raw => ("0-1", "ms"),
    };

    let mut table = String::new();
    table.push_str(&format!(
        "| URL | Performance ({s}) | Accessibility ({s}) | Best Practices ({s}) | SEO ({s}) | First Meaningful Paint ({t}) | Time to Interactive ({t}) |\n",
        s = score_unit,
        t = time_unit
    ));
    table.push_str("|:---|---:|---:|---:|---:|---:|---:|\n");

    for record in records {
        table.push_str(&format!(
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} |\n",
            record.url,
            record.performance_avg,
            record.accessibility_avg,
            record.best_practices_avg,
            record.seo_avg,
            record.first_meaningful_paint_avg,
            record.time_to_interactive_avg
        ));
    }

    table
}
