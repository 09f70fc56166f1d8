use crate::models::CatchAllMode;
use serde::{Deserialize, Serialize};

pub const BLUE_CROSS_BLUE_SHIELD: &str = "BLUE CROSS BLUE SHIELD";
pub const UNITEDHEALTHCARE_GROUP: &str = "UNITEDHEALTHCARE GROUP";
pub const HUMANA_GROUP: &str = "HUMANA GROUP";
pub const AETNA: &str = "AETNA";
pub const KAISER_PERMANENTE: &str = "KAISER PERMANENTE";

/// A single test against an upper-cased organization name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Matcher {
    StartsWith(String),
    Contains(String),
    Equals(String),
}

impl Matcher {
    fn upper(&self) -> Self {
        match self {
            Matcher::StartsWith(s) => Matcher::StartsWith(s.to_uppercase()),
            Matcher::Contains(s) => Matcher::Contains(s.to_uppercase()),
            Matcher::Equals(s) => Matcher::Equals(s.to_uppercase()),
        }
    }

    /// `name` must already be upper-cased.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::StartsWith(prefix) => name.starts_with(prefix.as_str()),
            Matcher::Contains(needle) => name.contains(needle.as_str()),
            Matcher::Equals(exact) => name == exact,
        }
    }
}

/// A group label and the matchers that send a name to it. Any matcher is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRule {
    pub label: String,
    pub matchers: Vec<Matcher>,
}

impl NameRule {
    pub fn new(label: &str, matchers: Vec<Matcher>) -> Self {
        Self {
            label: label.to_string(),
            matchers,
        }
    }
}

/// Built-in parent company consolidation table, highest precedence first.
pub fn default_rules() -> Vec<NameRule> {
    use Matcher::*;

    vec![
        // Anthem/Elevance plans are Blue licensees
        NameRule::new(
            BLUE_CROSS_BLUE_SHIELD,
            vec![
                StartsWith("BLUE".into()),
                StartsWith("BCBS".into()),
                StartsWith("ANTHEM".into()),
                Contains("BCBS".into()),
            ],
        ),
        NameRule::new(
            UNITEDHEALTHCARE_GROUP,
            vec![
                StartsWith("UNITEDHEALTHCARE".into()),
                StartsWith("UNITED HEALTHCARE".into()),
                Equals("SIERRA HEALTH AND LIFE INSURANCE COMPANY, INC.".into()),
            ],
        ),
        NameRule::new(HUMANA_GROUP, vec![StartsWith("HUMANA".into())]),
        NameRule::new(AETNA, vec![StartsWith("AETNA".into()), Contains("AETNA".into())]),
        NameRule::new(KAISER_PERMANENTE, vec![StartsWith("KAISER".into())]),
    ]
}

/// Maps raw organization names onto group labels.
///
/// Rules are tried in order and the first match wins; names matching no rule
/// are handled according to the [`CatchAllMode`].
#[derive(Debug, Clone)]
pub struct NameNormalizer {
    rules: Vec<NameRule>,
    catch_all: CatchAllMode,
    other_label: String,
}

impl NameNormalizer {
    pub fn new(rules: Vec<NameRule>, catch_all: CatchAllMode, other_label: &str) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| NameRule {
                label: rule.label,
                matchers: rule.matchers.iter().map(Matcher::upper).collect(),
            })
            .collect();

        Self {
            rules,
            catch_all,
            other_label: other_label.to_string(),
        }
    }

    pub fn with_default_rules(catch_all: CatchAllMode) -> Self {
        Self::new(default_rules(), catch_all, crate::models::DEFAULT_OTHER_LABEL)
    }

    pub fn rules(&self) -> &[NameRule] {
        &self.rules
    }

    pub fn catch_all(&self) -> CatchAllMode {
        self.catch_all
    }

    /// Label of the first rule matching `raw_name`, if any.
    pub fn classify(&self, raw_name: &str) -> Option<&str> {
        let name_upper = raw_name.to_uppercase();
        self.rules
            .iter()
            .find(|rule| rule.matchers.iter().any(|m| m.matches(&name_upper)))
            .map(|rule| rule.label.as_str())
    }

    pub fn normalize(&self, raw_name: &str) -> String {
        match self.classify(raw_name) {
            Some(label) => label.to_string(),
            None => match self.catch_all {
                CatchAllMode::Passthrough => raw_name.to_string(),
                CatchAllMode::Bucketed => self.other_label.clone(),
            },
        }
    }

    /// Position of `label` in the rule table, used to order report columns.
    pub fn rule_rank(&self, label: &str) -> Option<usize> {
        self.rules.iter().position(|rule| rule.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_OTHER_LABEL;

    fn passthrough() -> NameNormalizer {
        NameNormalizer::with_default_rules(CatchAllMode::Passthrough)
    }

    #[test]
    fn test_blue_cross_variants() {
        let n = passthrough();
        assert_eq!(n.normalize("Blue Cross and Blue Shield of Texas"), BLUE_CROSS_BLUE_SHIELD);
        assert_eq!(n.normalize("BCBS of Michigan"), BLUE_CROSS_BLUE_SHIELD);
        assert_eq!(n.normalize("Anthem Insurance Companies, Inc."), BLUE_CROSS_BLUE_SHIELD);
        assert_eq!(n.normalize("Highmark BCBSD Inc."), BLUE_CROSS_BLUE_SHIELD);
    }

    #[test]
    fn test_united_variants() {
        let n = passthrough();
        assert_eq!(n.normalize("UnitedHealthcare of Florida, Inc."), UNITEDHEALTHCARE_GROUP);
        assert_eq!(n.normalize("United HealthCare Insurance Company"), UNITEDHEALTHCARE_GROUP);
        assert_eq!(
            n.normalize("Sierra Health and Life Insurance Company, Inc."),
            UNITEDHEALTHCARE_GROUP
        );
        // Exact match only
        assert_eq!(
            n.normalize("Sierra Health and Life Insurance Company"),
            "Sierra Health and Life Insurance Company"
        );
    }

    #[test]
    fn test_other_major_groups() {
        let n = passthrough();
        assert_eq!(n.normalize("Humana Insurance Company"), HUMANA_GROUP);
        assert_eq!(n.normalize("Aetna Life Insurance Company"), AETNA);
        assert_eq!(n.normalize("Innovation Health (an Aetna company)"), AETNA);
        assert_eq!(n.normalize("Kaiser Foundation Health Plan, Inc."), KAISER_PERMANENTE);
    }

    #[test]
    fn test_precedence_first_rule_wins() {
        let n = passthrough();
        assert_eq!(n.normalize("BLUE AETNA MUTUAL"), BLUE_CROSS_BLUE_SHIELD);
        assert_eq!(n.normalize("HUMANA AETNA JOINT"), HUMANA_GROUP);
    }

    #[test]
    fn test_case_insensitive() {
        let n = passthrough();
        assert_eq!(n.normalize("humana gold plus"), n.normalize("HUMANA GOLD PLUS"));
        assert_eq!(n.normalize("humana gold plus"), HUMANA_GROUP);
    }

    #[test]
    fn test_no_trimming() {
        let n = passthrough();
        assert_eq!(n.normalize(" HUMANA"), " HUMANA");
        // Substring rules still see through leading whitespace
        assert_eq!(n.normalize("  aetna"), AETNA);
    }

    #[test]
    fn test_totality_on_odd_input() {
        let n = passthrough();
        let bucketed = NameNormalizer::with_default_rules(CatchAllMode::Bucketed);
        for name in ["", "   ", "\t", "1234", "ñandú salud", "..."] {
            assert_eq!(n.normalize(name), name);
            assert_eq!(bucketed.normalize(name), DEFAULT_OTHER_LABEL);
            assert_eq!(n.classify(name), None);
        }
    }

    #[test]
    fn test_bucketed_only_changes_unmatched() {
        let n = NameNormalizer::new(default_rules(), CatchAllMode::Bucketed, "OTHER");
        assert_eq!(n.normalize("CARE IMPROVEMENT PLUS SOUTH CENTRAL INSURANCE CO."), "OTHER");
        assert_eq!(n.normalize("Kaiser Permanente Insurance Company"), KAISER_PERMANENTE);
    }

    #[test]
    fn test_custom_rules_are_upper_cased() {
        let n = NameNormalizer::new(
            vec![NameRule::new("ACME", vec![Matcher::StartsWith("acme".into())])],
            CatchAllMode::Passthrough,
            "OTHER",
        );
        assert_eq!(n.normalize("Acme Health"), "ACME");
        assert_eq!(n.rules()[0].matchers[0], Matcher::StartsWith("ACME".into()));
        assert_eq!(n.rule_rank("ACME"), Some(0));
        assert_eq!(n.rule_rank("AETNA"), None);
    }

    #[test]
    fn test_default_table_order() {
        let labels: Vec<_> = default_rules().into_iter().map(|r| r.label).collect();
        assert_eq!(
            labels,
            vec![BLUE_CROSS_BLUE_SHIELD, UNITEDHEALTHCARE_GROUP, HUMANA_GROUP, AETNA, KAISER_PERMANENTE]
        );
    }
}
