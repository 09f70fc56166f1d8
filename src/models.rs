use crate::normalizer::NameRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_OTHER_LABEL: &str = "OTHER/UNGROUPED_MA_ENROLLMENT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Data source configuration
    pub data_source_mode: DataSourceMode,
    pub input_file: Option<String>,
    pub input_url: Option<String>,
    pub output_directory: Option<String>,
    // Grouping
    #[serde(default = "default_catch_all")]
    pub catch_all: CatchAllMode,
    pub other_label: Option<String>,
    #[serde(default = "default_top_groups")]
    pub top_groups: usize,
    pub output_columns: Option<Vec<ReportColumn>>,
    pub rules: Option<Vec<NameRule>>,
}

fn default_catch_all() -> CatchAllMode {
    CatchAllMode::Passthrough
}

fn default_top_groups() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
}

/// What happens to organization names that match no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatchAllMode {
    /// Keep the raw organization name as its own group.
    Passthrough,
    /// Fold every unmatched name into the "other" label.
    Bucketed,
}

/// One requested column of the county report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumn {
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
}

impl ReportColumn {
    pub fn new(group: &str, header: Option<&str>) -> Self {
        Self {
            group: group.to_string(),
            header: header.map(str::to_string),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_source_mode: DataSourceMode::Local,
            input_file: Some("SCC_Enrollment_MA_2025_11.csv".to_string()),
            input_url: None,
            output_directory: Some("output".to_string()),
            catch_all: default_catch_all(),
            other_label: Some(DEFAULT_OTHER_LABEL.to_string()),
            top_groups: default_top_groups(),
            output_columns: Some(vec![
                ReportColumn::new("UNITEDHEALTHCARE GROUP", Some("UNITEDHEALTHCARE_GROUP_ENROLLED")),
                ReportColumn::new("HUMANA GROUP", Some("HUMANA_GROUP_ENROLLED")),
                ReportColumn::new("AETNA", Some("AETNA_GROUP_ENROLLED")),
                ReportColumn::new("BLUE CROSS BLUE SHIELD", Some("BCBS_GROUP_ENROLLED")),
                ReportColumn::new("KAISER PERMANENTE", Some("KAISER_PERMANENTE_GROUP_ENROLLED")),
                // Long-tail carrier kept as its own column in passthrough mode
                ReportColumn::new(
                    "CARE IMPROVEMENT PLUS SOUTH CENTRAL INSURANCE CO.",
                    Some("CARE_IMPROVEMENT_PLUS_ENROLLED"),
                ),
            ]),
            rules: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.data_source_mode {
            DataSourceMode::Local if self.input_file.as_deref().unwrap_or("").is_empty() => {
                anyhow::bail!("input_file must be set when data_source_mode is \"local\"")
            }
            DataSourceMode::Internet if self.input_url.as_deref().unwrap_or("").is_empty() => {
                anyhow::bail!("input_url must be set when data_source_mode is \"internet\"")
            }
            _ => {}
        }
        if let Some(rules) = &self.rules {
            if let Some(rule) = rules.iter().find(|r| r.matchers.is_empty()) {
                anyhow::bail!("rule for {:?} has no matchers", rule.label);
            }
        }
        Ok(())
    }

    pub fn other_label(&self) -> &str {
        self.other_label.as_deref().unwrap_or(DEFAULT_OTHER_LABEL)
    }
}

/// A row exactly as the enrollment feed reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentRow {
    #[serde(rename = "County")]
    pub county: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "FIPS Code")]
    pub fips_code: Option<String>,
    #[serde(rename = "Organization Name")]
    pub organization_name: String,
    #[serde(rename = "Enrolled")]
    pub enrolled: String,
}

/// A row that survived sanitation, tagged with its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRecord {
    pub county: String,
    pub state: String,
    pub fips_code: String,
    pub organization_name: String,
    pub grouped_name: String,
    pub enrolled: u64,
}

/// One output row. `enrollment` holds every group of the table, zeros included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountySummary {
    pub fips_code: String,
    pub county: String,
    pub state: String,
    pub enrollment: BTreeMap<String, u64>,
}

impl CountySummary {
    pub fn enrolled(&self, group: &str) -> u64 {
        self.enrollment.get(group).copied().unwrap_or(0)
    }

    /// Sum across all groups, `None` if it does not fit in a `u64`.
    pub fn total(&self) -> Option<u64> {
        self.enrollment.values().try_fold(0u64, |acc, n| acc.checked_add(*n))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub rows_read: usize,
    pub dropped_missing_fips: usize,
    pub suppressed_cells: usize,
    pub inconsistent_labels: usize,
}

/// Dense counties x groups matrix, rows ordered by FIPS code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountyTable {
    /// Every group seen in the input: rule labels in rule order, then the rest alphabetically.
    pub groups: Vec<String>,
    pub rows: Vec<CountySummary>,
    pub stats: AggregationStats,
    /// Feed-wide enrollment per group, rows without a FIPS code included.
    pub group_totals: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTotal {
    #[serde(rename = "Grouped Organization Name")]
    pub group: String,
    #[serde(rename = "Total Enrolled")]
    pub total_enrolled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let path = path.to_str().unwrap();

        let config = Config::default();
        config.save_to_file(path).unwrap();
        let loaded = Config::load_from_file(path).unwrap();

        assert_eq!(loaded.data_source_mode, DataSourceMode::Local);
        assert_eq!(loaded.catch_all, CatchAllMode::Passthrough);
        assert_eq!(loaded.top_groups, 10);
        assert_eq!(loaded.output_columns, config.output_columns);
        assert!(loaded.rules.is_none());
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_parse_config_with_rules() {
        let config: Config = toml::from_str(
            r#"
            data_source_mode = "internet"
            input_url = "https://example.com/scc.csv"
            catch_all = "bucketed"
            top_groups = 5

            [[output_columns]]
            group = "ACME"

            [[rules]]
            label = "ACME"
            matchers = [{ kind = "starts_with", value = "acme" }, { kind = "contains", value = "ROADRUNNER" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.catch_all, CatchAllMode::Bucketed);
        assert_eq!(config.other_label(), DEFAULT_OTHER_LABEL);
        assert_eq!(config.output_columns.as_ref().unwrap()[0].header, None);
        let rules = config.rules.as_ref().unwrap();
        assert_eq!(rules[0].label, "ACME");
        assert_eq!(rules[0].matchers.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_source_mode = "local"
            input_file = "scc.csv"
            "#,
        )
        .unwrap();
        assert_eq!(config.catch_all, CatchAllMode::Passthrough);
        assert_eq!(config.top_groups, 10);
        assert!(config.output_columns.is_none());
    }

    #[test]
    fn test_validate_requires_url_for_internet_mode() {
        let config = Config {
            data_source_mode: DataSourceMode::Internet,
            input_url: None,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_missing_group_reads_zero() {
        let mut enrollment = BTreeMap::new();
        enrollment.insert("AETNA".to_string(), 7);
        enrollment.insert("HUMANA GROUP".to_string(), 3);
        let row = CountySummary {
            fips_code: "12345".to_string(),
            county: "Test".to_string(),
            state: "FL".to_string(),
            enrollment,
        };
        assert_eq!(row.enrolled("AETNA"), 7);
        assert_eq!(row.enrolled("KAISER PERMANENTE"), 0);
        assert_eq!(row.total(), Some(10));
    }
}
