//! Site list loading and URL normalization.
//!
//! Sites come from a newline-delimited file and from the command line or
//! config. Every entry is normalized into a URL plus a filesystem-safe name
//! that doubles as the report filename stem.

use crate::models::{Site, HTML_EXT, JSON_EXT};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Characters replaced by `_` when deriving a site name.
const RESERVED: [char; 9] = ['/', '?', '#', ':', '*', '$', '@', '!', '.'];

/// Normalize raw input into a URL, defaulting the scheme to https.
pub fn normalize_url(raw: &str) -> String {
    let url = raw.trim();

    if url.starts_with("http:") || url.starts_with("https:") {
        return url.to_string();
    }

    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        format!("https://{}", url)
    }
}

/// Derive a filesystem-safe name from a URL.
pub fn site_name(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);

    stripped.replace(RESERVED, "_")
}

impl Site {
    /// Build a site from raw user input.
    pub fn from_raw(raw: &str, html: bool) -> Self {
        let url = normalize_url(raw);
        let name = site_name(&url);

        Self {
            json_file: format!("{}{}", name, JSON_EXT),
            html_file: html.then(|| format!("{}{}", name, HTML_EXT)),
            url,
            name,
        }
    }
}

/// Read a newline-delimited site file, skipping blank lines.
pub fn read_site_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read site file {}", path.display()))?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

/// Collect every configured site: file entries first, then the inline list.
pub fn load_sites(file: Option<&Path>, inline: &[String], html: bool) -> Result<Vec<Site>> {
    let mut raw = Vec::new();

    if let Some(path) = file {
        raw.extend(read_site_file(path)?);
    }

    raw.extend(
        inline
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from),
    );

    let sites: Vec<Site> = raw.iter().map(|s| Site::from_raw(s, html)).collect();
    debug!("Loaded {} sites", sites.len());

    Ok(sites)
}
