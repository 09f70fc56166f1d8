use crate::models::{CountyTable, GroupTotal, ReportColumn};
use anyhow::{Context, Result};
use csv::Writer;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const COUNTY_REPORT_FILE: &str = "county_enrollment_by_major_groups.csv";
pub const TOP_GROUPS_FILE: &str = "top_ma_enrollment_by_major_groups.csv";

/// A group column of the county report with its resolved header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub group: String,
    pub header: String,
}

/// `HUMANA GROUP` -> `HUMANA_GROUP_ENROLLED`
fn derive_header(group: &str, separators: &Regex) -> String {
    let upper = group.to_uppercase();
    let snake = separators.replace_all(&upper, "_");
    format!("{}_ENROLLED", snake.trim_matches('_'))
}

/// Columns in the order the caller asked for, or every group of the table.
///
/// Explicit headers must be unique. A derived header that collides with an
/// earlier one gets a numeric suffix.
pub fn resolve_columns(table: &CountyTable, requested: Option<&[ReportColumn]>) -> Result<Vec<OutputColumn>> {
    let separators = Regex::new(r"[^A-Z0-9]+")?;

    let wanted: Vec<(String, Option<String>)> = match requested {
        Some(requested) => requested
            .iter()
            .map(|column| {
                if !table.groups.contains(&column.group) {
                    log::warn!("Requested column {:?} has no enrollment in the input; writing zeros", column.group);
                }
                (column.group.clone(), column.header.clone())
            })
            .collect(),
        None => table.groups.iter().map(|group| (group.clone(), None)).collect(),
    };

    let mut taken: HashSet<String> = ["County", "State", "FIPS_Code"].iter().map(|h| h.to_string()).collect();
    let mut columns = Vec::with_capacity(wanted.len());

    for (group, header) in wanted {
        let header = match header {
            Some(header) => {
                if taken.contains(&header) {
                    anyhow::bail!("Duplicate report header {:?} for column {:?}", header, group);
                }
                header
            }
            None => {
                let base = derive_header(&group, &separators);
                let mut header = base.clone();
                let mut n = 2;
                while taken.contains(&header) {
                    header = format!("{}_{}", base, n);
                    n += 1;
                }
                if header != base {
                    log::warn!("Header {} is already used; writing {:?} as {}", base, group, header);
                }
                header
            }
        };
        taken.insert(header.clone());
        columns.push(OutputColumn { group, header });
    }

    Ok(columns)
}

/// Write through a temporary sibling file so a failed run leaves no partial report.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut Writer<fs::File>) -> Result<()>,
{
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let result = (|| -> Result<()> {
        let mut writer = Writer::from_path(&tmp_path)?;
        write(&mut writer)?;
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.context(format!("Failed to write {}", path.display())));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(anyhow::Error::new(e).context(format!("Failed to move report into place: {}", path.display())));
    }
    Ok(())
}

pub fn write_county_report(table: &CountyTable, columns: &[OutputColumn], path: &Path) -> Result<()> {
    write_atomically(path, |writer| {
        let mut header = vec!["County", "State", "FIPS_Code"];
        header.extend(columns.iter().map(|c| c.header.as_str()));
        writer.write_record(&header)?;

        for row in &table.rows {
            let mut record = vec![row.county.clone(), row.state.clone(), row.fips_code.clone()];
            record.extend(columns.iter().map(|c| row.enrolled(&c.group).to_string()));
            writer.write_record(&record)?;
        }
        Ok(())
    })
}

pub fn write_top_groups(totals: &[GroupTotal], path: &Path) -> Result<()> {
    write_atomically(path, |writer| {
        if totals.is_empty() {
            writer.write_record(["Grouped Organization Name", "Total Enrolled"])?;
        }
        for total in totals {
            writer.serialize(total)?;
        }
        Ok(())
    })
}

/// Verification block printed after a run.
pub fn print_preview(table: &CountyTable, columns: &[OutputColumn], limit: usize) {
    let unique_fips = table
        .rows
        .iter()
        .map(|r| r.fips_code.as_str())
        .collect::<HashSet<_>>()
        .len();

    println!("\n📊 SUMMARY");
    println!("==========");
    println!("Total rows in the county report: {}", table.rows.len());
    println!("Total unique FIPS Codes: {}", unique_fips);
    println!("Rows read: {}", table.stats.rows_read);
    println!("Rows dropped (missing FIPS): {}", table.stats.dropped_missing_fips);
    println!("Suppressed cells counted as 0: {}", table.stats.suppressed_cells);
    if table.stats.inconsistent_labels > 0 {
        println!("⚠️  FIPS codes with conflicting county labels: {}", table.stats.inconsistent_labels);
    }

    println!("\nFirst {} rows:", limit.min(table.rows.len()));
    let headers: Vec<&str> = columns.iter().map(|c| c.header.as_str()).collect();
    println!("   County | State | FIPS_Code | {}", headers.join(" | "));
    for row in table.rows.iter().take(limit) {
        let values: Vec<String> = columns.iter().map(|c| row.enrolled(&c.group).to_string()).collect();
        println!("   {} | {} | {} | {}", row.county, row.state, row.fips_code, values.join(" | "));
    }
}
