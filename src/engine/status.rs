//! Canonical lifecycle categories for free-form application statuses.
//!
//! Upstream systems report statuses as loosely-typed strings. They are normalized here through an
//! ordered rule table: the first rule that matches decides the category, and anything unmatched
//! falls back to [`Category::Pending`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Confirmed,
    Finished,
    Rejected,
    Limit,
    Pending,
}

impl Category {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Confirmed,
            Self::Finished,
            Self::Rejected,
            Self::Limit,
            Self::Pending,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Finished => "Finished",
            Self::Rejected => "Rejected",
            Self::Limit => "Limit",
            Self::Pending => "Pending",
        }
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Finished => "FINISHED",
            Self::Rejected => "REJECTED",
            Self::Limit => "LIMIT",
            Self::Pending => "PENDING",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    /// Parses a category code such as `finished`; this does not classify raw statuses.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let code = value.trim().to_ascii_uppercase();
        Category::ordered()
            .into_iter()
            .find(|category| category.code() == code)
            .ok_or_else(|| format!("unknown category '{}'", value.trim()))
    }
}

/// One documented rule: the status matches when it equals any `exact` value (case-sensitive) or
/// contains any `contains` fragment (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRule {
    pub exact: &'static [&'static str],
    pub contains: &'static [&'static str],
    pub category: Category,
}

impl StatusRule {
    fn matches(&self, raw: &str, upper: &str) -> bool {
        self.exact.iter().any(|value| *value == raw)
            || self
                .contains
                .iter()
                .any(|fragment| upper.contains(fragment))
    }
}

/// Evaluated top to bottom. Fragments in `contains` must be upper case.
pub const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        exact: &["CONFIRMED"],
        contains: &[],
        category: Category::Confirmed,
    },
    StatusRule {
        exact: &["FINISHED", "COMPLETED", "ACTIVE"],
        contains: &[],
        category: Category::Finished,
    },
    StatusRule {
        exact: &["REJECTED"],
        contains: &["CANCELED", "RAD", "SCORING", "DECLINED", "REFUSED"],
        category: Category::Rejected,
    },
    StatusRule {
        exact: &["LIMIT"],
        contains: &["LIMIT"],
        category: Category::Limit,
    },
    StatusRule {
        exact: &[
            "CREATED",
            "ADDED_DETAIL",
            "ADDED_PRODUCT",
            "PENDING",
            "NEW",
            "PROCESSING",
        ],
        contains: &["WAITING"],
        category: Category::Pending,
    },
];

/// Index into [`STATUS_RULES`] of the rule that decides `raw`, or `None` when the default applies.
pub fn matching_rule(raw: &str) -> Option<usize> {
    let upper = raw.to_uppercase();
    STATUS_RULES
        .iter()
        .position(|rule| rule.matches(raw, &upper))
}

/// Unknown statuses are reported as pending.
// TODO: confirm with operations whether unrecognized statuses deserve their own category.
pub fn classify(raw: &str) -> Category {
    matching_rule(raw)
        .map(|index| STATUS_RULES[index].category)
        .unwrap_or(Category::Pending)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_statuses_map_to_their_category() {
        assert_eq!(classify("CONFIRMED"), Category::Confirmed);
        assert_eq!(classify("FINISHED"), Category::Finished);
        assert_eq!(classify("COMPLETED"), Category::Finished);
        assert_eq!(classify("ACTIVE"), Category::Finished);
        assert_eq!(classify("REJECTED"), Category::Rejected);
        assert_eq!(classify("LIMIT"), Category::Limit);
        for pending in [
            "CREATED",
            "ADDED_DETAIL",
            "ADDED_PRODUCT",
            "PENDING",
            "NEW",
            "PROCESSING",
        ] {
            assert_eq!(classify(pending), Category::Pending, "{pending}");
        }
    }

    #[test]
    fn rejection_fragments_match_case_insensitively() {
        assert_eq!(classify("SCORING RAD ETDI"), Category::Rejected);
        assert_eq!(classify("canceled_by_client"), Category::Rejected);
        assert_eq!(classify("Declined by bank"), Category::Rejected);
        assert_eq!(classify("USER_REFUSED"), Category::Rejected);
    }

    #[test]
    fn scoring_in_progress_stays_rejected() {
        assert_eq!(classify("SCORING_IN_PROGRESS"), Category::Rejected);
        assert_eq!(matching_rule("SCORING_IN_PROGRESS"), Some(2));
    }

    #[test]
    fn rejection_outranks_limit() {
        assert_eq!(classify("LIMIT_DECLINED"), Category::Rejected);
        assert_eq!(classify("OVER_LIMIT"), Category::Limit);
    }

    #[test]
    fn waiting_and_unknown_statuses_are_pending() {
        assert_eq!(classify("WAITING_FOR_DOCUMENTS"), Category::Pending);
        assert_eq!(matching_rule("WAITING_FOR_DOCUMENTS"), Some(4));
        assert_eq!(classify("SOMETHING_NEW_FROM_UPSTREAM"), Category::Pending);
        assert_eq!(matching_rule("SOMETHING_NEW_FROM_UPSTREAM"), None);
        assert_eq!(classify(""), Category::Pending);
    }

    #[test]
    fn exact_rules_are_case_sensitive() {
        assert_eq!(classify("confirmed"), Category::Pending);
        assert_eq!(classify("finished"), Category::Pending);
    }

    #[test]
    fn parses_category_codes() {
        assert_eq!("finished".parse::<Category>(), Ok(Category::Finished));
        assert_eq!(" LIMIT ".parse::<Category>(), Ok(Category::Limit));
        assert!("ACTIVE".parse::<Category>().is_err());
    }

    #[test]
    fn every_rule_is_reachable() {
        let samples = ["CONFIRMED", "ACTIVE", "REJECTED", "LIMIT_EXCEEDED", "WAITING_BANK"];
        assert_eq!(samples.len(), STATUS_RULES.len());
        for (index, sample) in samples.iter().enumerate() {
            assert_eq!(matching_rule(sample), Some(index), "{sample}");
        }
    }

    #[test]
    fn exact_and_substring_forms_report_the_same_rule() {
        assert_eq!(matching_rule("REJECTED"), matching_rule("canceled_by_client"));
        assert_eq!(matching_rule("LIMIT"), Some(3));
        assert_eq!(matching_rule("OVER_LIMIT"), Some(3));
        assert_eq!(matching_rule("NEW"), matching_rule("WAITING_FOR_CONTRACT"));
    }
}
