use crate::models::EnrollmentRow;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;

/// Columns every enrollment feed must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["County", "State", "FIPS Code", "Organization Name", "Enrolled"];

/// Reads the plan-by-county enrollment feed from disk or over HTTP.
pub struct EnrollmentFeed {
    client: reqwest::Client,
}

impl EnrollmentFeed {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn read_file(&self, file_path: &str) -> Result<Vec<EnrollmentRow>> {
        let file = File::open(file_path)
            .with_context(|| format!("Failed to open enrollment file: {}", file_path))?;

        self.parse_csv(file, file_path)
    }

    /// Download the feed in one attempt; there is no retry.
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<EnrollmentRow>> {
        println!("🌐 Fetching enrollment data from: {}", url);

        let response = self.client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .with_context(|| format!("Failed to fetch URL: {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("HTTP request failed with status: {}", response.status()));
        }

        let content = response.bytes().await
            .with_context(|| format!("Failed to read response body from: {}", url))?;

        self.parse_csv(content.as_ref(), url)
    }

    pub fn parse_csv<R: Read>(&self, reader: R, source: &str) -> Result<Vec<EnrollmentRow>> {
        let mut reader = csv::Reader::from_reader(reader);

        let headers = reader
            .headers()
            .with_context(|| format!("Failed to read header row of {}", source))?;
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !headers.iter().any(|h| h == *column))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("{} is missing required columns: {}", source, missing.join(", "));
        }

        let mut rows = Vec::new();

        for (i, result) in reader.deserialize::<EnrollmentRow>().enumerate() {
            let row = result.with_context(|| format!("Invalid row {} in {}", i + 1, source))?;
            rows.push(row);
        }

        if rows.is_empty() {
            log::warn!("No enrollment rows found in {}", source);
        } else {
            log::info!("Read {} enrollment rows from {}", rows.len(), source);
        }

        Ok(rows)
    }
}
