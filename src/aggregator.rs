use crate::error::AggregateError;
use crate::models::{
    AggregationStats, CatchAllMode, CountySummary, CountyTable, EnrollmentRecord, EnrollmentRow, GroupTotal,
};
use crate::normalizer::NameNormalizer;
use std::collections::{BTreeMap, BTreeSet};

/// Marker the feed uses for small-count cells withheld for privacy.
pub const SUPPRESSION_MARKER: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrolled {
    Count(u64),
    Suppressed,
}

impl Enrolled {
    /// Suppressed cells count as zero. This undercounts counties with many tiny plans.
    pub fn value(self) -> u64 {
        match self {
            Enrolled::Count(n) => n,
            Enrolled::Suppressed => 0,
        }
    }
}

/// Parse an `Enrolled` cell. `None` means the value is neither a count nor the marker.
pub fn parse_enrolled(raw: &str) -> Option<Enrolled> {
    let trimmed = raw.trim();
    if trimmed == SUPPRESSION_MARKER {
        return Some(Enrolled::Suppressed);
    }
    trimmed.parse::<u64>().ok().map(Enrolled::Count)
}

/// Rows that passed sanitation plus what was learned while checking them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub records: Vec<EnrollmentRecord>,
    pub stats: AggregationStats,
    pub group_totals: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct CountyAccumulator {
    county: String,
    state: String,
    label_conflict: bool,
    sums: BTreeMap<String, u64>,
}

pub struct CountyAggregator {
    normalizer: NameNormalizer,
}

impl CountyAggregator {
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Coerce enrollment, drop rows without a FIPS code and attach group labels.
    ///
    /// Enrollment is checked for every row before anything is dropped, so a
    /// malformed value fails the run even on a row that would be discarded.
    /// Feed-wide group totals are taken at the same point and include rows
    /// that have no FIPS code.
    pub fn sanitize(&self, rows: &[EnrollmentRow]) -> Result<Sanitized, AggregateError> {
        let mut stats = AggregationStats {
            rows_read: rows.len(),
            ..AggregationStats::default()
        };

        let mut parsed = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let enrolled = parse_enrolled(&row.enrolled).ok_or_else(|| AggregateError::MalformedEnrollment {
                row: i + 1,
                fips: row.fips_code.clone().unwrap_or_default(),
                value: row.enrolled.clone(),
            })?;
            if enrolled == Enrolled::Suppressed {
                stats.suppressed_cells += 1;
            }
            parsed.push((row, enrolled.value()));
        }

        let mut group_totals: BTreeMap<String, u64> = BTreeMap::new();
        let mut records = Vec::with_capacity(parsed.len());
        for (row, enrolled) in parsed {
            let grouped_name = self.normalizer.normalize(&row.organization_name);
            let total = group_totals.entry(grouped_name.clone()).or_insert(0);
            *total = total
                .checked_add(enrolled)
                .ok_or_else(|| AggregateError::EnrollmentOverflow {
                    fips: row.fips_code.clone().unwrap_or_default(),
                    group: grouped_name.clone(),
                })?;

            let fips_code = match row.fips_code.as_deref().map(str::trim) {
                Some(fips) if !fips.is_empty() => fips.to_string(),
                _ => {
                    log::debug!("Dropping row without FIPS code: {} / {}", row.county, row.organization_name);
                    stats.dropped_missing_fips += 1;
                    continue;
                }
            };

            records.push(EnrollmentRecord {
                county: row.county.clone(),
                state: row.state.clone(),
                fips_code,
                organization_name: row.organization_name.clone(),
                grouped_name,
                enrolled,
            });
        }

        Ok(Sanitized {
            records,
            stats,
            group_totals,
        })
    }

    /// Roll enrollment rows up into one dense row per FIPS code.
    pub fn aggregate(&self, rows: &[EnrollmentRow]) -> Result<CountyTable, AggregateError> {
        let Sanitized {
            records,
            mut stats,
            group_totals,
        } = self.sanitize(rows)?;

        // Step 1: reduce to FIPS -> {group -> sum}
        let mut counties: BTreeMap<String, CountyAccumulator> = BTreeMap::new();
        let mut seen_groups: BTreeSet<String> = BTreeSet::new();

        for record in records {
            let acc = counties
                .entry(record.fips_code.clone())
                .or_insert_with(|| CountyAccumulator {
                    county: record.county.clone(),
                    state: record.state.clone(),
                    label_conflict: false,
                    sums: BTreeMap::new(),
                });

            if !acc.label_conflict && (acc.county != record.county || acc.state != record.state) {
                log::warn!(
                    "FIPS {} is labelled both {}, {} and {}, {}; keeping the first",
                    record.fips_code,
                    acc.county,
                    acc.state,
                    record.county,
                    record.state
                );
                acc.label_conflict = true;
                stats.inconsistent_labels += 1;
            }

            let sum = acc.sums.entry(record.grouped_name.clone()).or_insert(0);
            *sum = sum
                .checked_add(record.enrolled)
                .ok_or_else(|| AggregateError::EnrollmentOverflow {
                    fips: record.fips_code.clone(),
                    group: record.grouped_name.clone(),
                })?;
            seen_groups.insert(record.grouped_name);
        }

        let groups = self.order_groups(seen_groups);

        // Step 2: densify so every county carries every group
        let rows = counties
            .into_iter()
            .map(|(fips_code, acc)| {
                let enrollment = groups
                    .iter()
                    .map(|group| (group.clone(), acc.sums.get(group).copied().unwrap_or(0)))
                    .collect();
                CountySummary {
                    fips_code,
                    county: acc.county,
                    state: acc.state,
                    enrollment,
                }
            })
            .collect();

        Ok(CountyTable {
            groups,
            rows,
            stats,
            group_totals,
        })
    }

    /// Rule labels in rule order, then everything else alphabetically.
    fn order_groups(&self, seen: BTreeSet<String>) -> Vec<String> {
        let mut groups: Vec<String> = seen.into_iter().collect();
        groups.sort_by_key(|g| self.normalizer.rule_rank(g).unwrap_or(usize::MAX));
        groups
    }

    /// Total enrollment per group over the whole feed, largest first.
    ///
    /// Rows without a FIPS code count here even though they have no county row.
    pub fn rank_groups(&self, table: &CountyTable, limit: usize) -> Vec<GroupTotal> {
        let mut totals: Vec<GroupTotal> = table
            .group_totals
            .iter()
            .map(|(group, total)| GroupTotal {
                group: group.clone(),
                total_enrolled: *total,
            })
            .collect();

        totals.sort_by(|a, b| {
            b.total_enrolled
                .cmp(&a.total_enrolled)
                .then_with(|| a.group.cmp(&b.group))
        });
        totals.truncate(limit);
        totals
    }
}

/// Aggregate with the built-in rule table.
pub fn aggregate(rows: &[EnrollmentRow], mode: CatchAllMode) -> Result<CountyTable, AggregateError> {
    CountyAggregator::new(NameNormalizer::with_default_rules(mode)).aggregate(rows)
}
