//! Report filtering and sorting
//!
//! `apply` turns an unordered record set plus a `QueryState` into the ordered
//! public view: approved records only, every selected filter satisfied, then a
//! stable sort by the chosen key.

use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Category, Report, Severity, Status};

/// Sentinel label for "no filter"
pub const ALL: &str = "All";

/// Fields the engine reads from a record
pub trait CatalogRecord {
    fn status(&self) -> Status;
    fn category(&self) -> Category;
    fn year(&self) -> i32;
    fn organization(&self) -> &str;
    fn severity(&self) -> Severity;
    fn submitted(&self) -> NaiveDate;
    fn title(&self) -> &str;
    /// Every text field free-text search looks at
    fn search_fields(&self) -> Vec<&str>;
}

impl CatalogRecord for Report {
    fn status(&self) -> Status {
        self.status
    }

    fn category(&self) -> Category {
        self.category
    }

    fn year(&self) -> i32 {
        self.year
    }

    fn organization(&self) -> &str {
        &self.organization
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn submitted(&self) -> NaiveDate {
        self.submitted_date
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn search_fields(&self) -> Vec<&str> {
        let category: &'static str = self.category.into();
        let mut fields = vec![
            self.title.as_str(),
            self.description.as_str(),
            self.summary.as_str(),
            category,
            self.organization.as_str(),
        ];
        fields.extend(self.tags.iter().map(String::as_str));
        if let Some(cve) = &self.cve_id {
            fields.push(cve);
        }
        fields
    }
}

// ============================================================================
// QUERY STATE
// ============================================================================

/// A filter choice: everything, or one concrete value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self::All
    }
}

impl<T: PartialEq> Selection<T> {
    pub fn admits(&self, value: &T) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == value,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl<T: FromStr> FromStr for Selection<T> {
    type Err = T::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case(ALL) {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL),
            Self::Only(value) => value.fmt(f),
        }
    }
}

/// Ordering applied after filtering
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    SeverityHigh,
    SeverityLow,
    TitleAsc,
    TitleDesc,
    /// Any other key; leaves the filtered order untouched
    Unrecognized(String),
}

impl SortKey {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::SeverityHigh => "severity-high",
            Self::SeverityLow => "severity-low",
            Self::TitleAsc => "title-asc",
            Self::TitleDesc => "title-desc",
            Self::Unrecognized(key) => key,
        }
    }
}

impl FromStr for SortKey {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "newest" => Self::Newest,
            "oldest" => Self::Oldest,
            "severity-high" => Self::SeverityHigh,
            "severity-low" => Self::SeverityLow,
            "title-asc" => Self::TitleAsc,
            "title-desc" => Self::TitleDesc,
            other => Self::Unrecognized(other.to_string()),
        })
    }
}

impl From<String> for SortKey {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(key) => key,
            Err(never) => match never {},
        }
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.as_str().to_string()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-selected filters, free-text search and sort key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    pub search: String,
    pub category: Selection<Category>,
    pub year: Selection<i32>,
    pub organization: Selection<String>,
    pub severity: Selection<Severity>,
    pub sort: SortKey,
}

impl QueryState {
    /// Number of concrete (non-`All`) filter selections
    pub fn active_filter_count(&self) -> usize {
        [
            !self.category.is_all(),
            !self.year.is_all(),
            !self.organization.is_all(),
            !self.severity.is_all(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    /// Reset every filter and the search text. The sort key is kept.
    pub fn clear_filters(&mut self) {
        self.search.clear();
        self.category = Selection::All;
        self.year = Selection::All;
        self.organization = Selection::All;
        self.severity = Selection::All;
    }

    fn admits<R: CatalogRecord>(&self, record: &R, needle: &str) -> bool {
        record.status() == Status::Approved
            && self.category.admits(&record.category())
            && self.year.admits(&record.year())
            && match &self.organization {
                Selection::All => true,
                Selection::Only(org) => org == record.organization(),
            }
            && self.severity.admits(&record.severity())
            && (needle.is_empty()
                || record
                    .search_fields()
                    .iter()
                    .any(|field| field.to_lowercase().contains(needle)))
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Filter then sort. The input slice is left untouched.
pub fn apply<R: CatalogRecord + Clone>(records: &[R], query: &QueryState) -> Vec<R> {
    let needle = query.search.to_lowercase();

    let mut view: Vec<R> = records
        .iter()
        .filter(|record| query.admits(*record, &needle))
        .cloned()
        .collect();

    sort_records(&mut view, &query.sort);
    view
}

/// Stable sort by key; `Unrecognized` is a no-op
pub fn sort_records<R: CatalogRecord>(records: &mut [R], key: &SortKey) {
    match key {
        SortKey::Newest => records.sort_by(|a, b| b.submitted().cmp(&a.submitted())),
        SortKey::Oldest => records.sort_by(|a, b| a.submitted().cmp(&b.submitted())),
        SortKey::SeverityHigh => {
            records.sort_by(|a, b| b.severity().rank().cmp(&a.severity().rank()))
        }
        SortKey::SeverityLow => {
            records.sort_by(|a, b| a.severity().rank().cmp(&b.severity().rank()))
        }
        SortKey::TitleAsc => records.sort_by(|a, b| collate(a.title(), b.title())),
        SortKey::TitleDesc => records.sort_by(|a, b| collate(b.title(), a.title())),
        SortKey::Unrecognized(_) => {}
    }
}

/// Dictionary-style comparison: case-folded first, lowercase ahead of uppercase on ties.
pub fn collate(a: &str, b: &str) -> Ordering {
    let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    folded(a).cmp(&folded(b)).then_with(|| b.cmp(a))
}

// ============================================================================
// FACETS
// ============================================================================

/// Distinct filter choices present in a record set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    pub categories: Vec<Category>,
    pub years: Vec<i32>,
    pub organizations: Vec<String>,
}

impl Facets {
    pub fn collect<R: CatalogRecord>(records: &[R]) -> Self {
        let mut categories: Vec<Category> = Vec::new();
        let mut years: Vec<i32> = Vec::new();
        let mut organizations: Vec<String> = Vec::new();

        for record in records {
            if !categories.contains(&record.category()) {
                categories.push(record.category());
            }
            if !years.contains(&record.year()) {
                years.push(record.year());
            }
            if !organizations.iter().any(|o| o == record.organization()) {
                organizations.push(record.organization().to_string());
            }
        }

        categories.sort_by_key(|c| c.to_string());
        years.sort_by(|a, b| b.cmp(a));
        organizations.sort();

        Self {
            categories,
            years,
            organizations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::sample_reports;

    fn ids(reports: &[Report]) -> Vec<&str> {
        reports.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_critical_only_newest_first() {
        let reports = sample_reports();
        let query = QueryState {
            severity: Selection::Only(Severity::Critical),
            ..Default::default()
        };

        let view = apply(&reports, &query);
        assert_eq!(ids(&view), vec!["r1", "r7"]);
    }

    #[test]
    fn test_no_filters_returns_all_approved() {
        let reports = sample_reports();
        let view = apply(&reports, &QueryState::default());

        let approved = reports
            .iter()
            .filter(|r| r.status == Status::Approved)
            .count();
        assert_eq!(view.len(), approved);
        assert_eq!(view.len(), 12);
        for pair in view.windows(2) {
            assert!(pair[0].submitted_date >= pair[1].submitted_date);
        }
    }

    #[test]
    fn test_cve_search_case_insensitive() {
        let reports = sample_reports();
        for needle in ["CVE-2025-1234", "cve-2025-1234", "2025-1234"] {
            let query = QueryState {
                search: needle.to_string(),
                ..Default::default()
            };
            let view = apply(&reports, &query);
            assert_eq!(ids(&view), vec!["r1"], "needle {}", needle);
        }
    }

    #[test]
    fn test_search_covers_tags_and_organization() {
        let reports = sample_reports();
        let by_tag = apply(
            &reports,
            &QueryState {
                search: "vlan".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(ids(&by_tag), vec!["r9"]);

        let by_org = apply(
            &reports,
            &QueryState {
                search: "cryptosoft".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(ids(&by_org), vec!["r11"]);
    }

    #[test]
    fn test_unapproved_never_visible() {
        let reports = sample_reports();
        let queries = [
            QueryState::default(),
            QueryState {
                search: "ssrf".to_string(),
                ..Default::default()
            },
            QueryState {
                organization: Selection::Only("HookHub".to_string()),
                ..Default::default()
            },
            QueryState {
                severity: Selection::Only(Severity::Low),
                sort: SortKey::SeverityLow,
                ..Default::default()
            },
        ];

        for query in &queries {
            let view = apply(&reports, query);
            assert!(view.iter().all(|r| r.status == Status::Approved));
            assert!(!view.iter().any(|r| r.id == "r13" || r.id == "r14"));
        }
    }

    #[test]
    fn test_reapplying_is_idempotent() {
        let reports = sample_reports();
        let query = QueryState {
            category: Selection::Only(Category::WebSecurity),
            sort: SortKey::TitleAsc,
            ..Default::default()
        };

        let once = apply(&reports, &query);
        let twice = apply(&once, &query);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_severity_high_is_non_increasing_and_stable() {
        let reports = sample_reports();
        let query = QueryState {
            sort: SortKey::SeverityHigh,
            ..Default::default()
        };

        let view = apply(&reports, &query);
        for pair in view.windows(2) {
            assert!(pair[0].severity.rank() >= pair[1].severity.rank());
        }

        // Equal severities keep their input order
        let highs: Vec<&str> = view
            .iter()
            .filter(|r| r.severity == Severity::High)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(highs, vec!["r3", "r6", "r8", "r9", "r11"]);
    }

    #[test]
    fn test_severity_low_ascends() {
        let view = apply(
            &sample_reports(),
            &QueryState {
                sort: SortKey::SeverityLow,
                ..Default::default()
            },
        );
        assert_eq!(view.first().map(|r| r.severity), Some(Severity::Low));
        assert_eq!(view.last().map(|r| r.severity), Some(Severity::Critical));
    }

    #[test]
    fn test_unknown_sort_keeps_filtered_order() {
        let reports = sample_reports();
        let query = QueryState {
            sort: "most-liked".parse().unwrap(),
            ..Default::default()
        };
        assert_eq!(query.sort, SortKey::Unrecognized("most-liked".to_string()));

        let view = apply(&reports, &query);
        let expected: Vec<&str> = reports
            .iter()
            .filter(|r| r.status == Status::Approved)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids(&view), expected);
    }

    #[test]
    fn test_title_sorts() {
        let reports = sample_reports();
        let asc = apply(
            &reports,
            &QueryState {
                sort: SortKey::TitleAsc,
                ..Default::default()
            },
        );
        assert_eq!(asc[0].title, "Default Credentials on Smart Cameras");

        let desc = apply(
            &reports,
            &QueryState {
                sort: SortKey::TitleDesc,
                ..Default::default()
            },
        );
        assert_eq!(desc[0].title, "VLAN Segmentation Bypass via Double Tagging");
    }

    #[test]
    fn test_collate_ignores_case_first() {
        assert_eq!(collate("apple", "Banana"), Ordering::Less);
        assert_eq!(collate("Zebra", "apple"), Ordering::Greater);
        assert_eq!(collate("a", "A"), Ordering::Less);
        assert_eq!(collate("same", "same"), Ordering::Equal);
    }

    #[test]
    fn test_year_and_organization_filters() {
        let reports = sample_reports();
        let query = QueryState {
            year: Selection::Only(2023),
            organization: Selection::Only("CryptoSoft Ltd".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&apply(&reports, &query)), vec!["r11"]);
        assert_eq!(query.active_filter_count(), 2);
    }

    #[test]
    fn test_empty_input() {
        let empty: Vec<Report> = Vec::new();
        assert!(apply(&empty, &QueryState::default()).is_empty());
    }

    #[test]
    fn test_input_not_mutated() {
        let reports = sample_reports();
        let before = reports.clone();
        let _ = apply(
            &reports,
            &QueryState {
                sort: SortKey::TitleDesc,
                ..Default::default()
            },
        );
        assert_eq!(reports, before);
    }

    #[test]
    fn test_selection_parsing() {
        assert_eq!("All".parse::<Selection<i32>>().unwrap(), Selection::All);
        assert_eq!("".parse::<Selection<i32>>().unwrap(), Selection::All);
        assert_eq!(
            "2024".parse::<Selection<i32>>().unwrap(),
            Selection::Only(2024)
        );
        assert_eq!(
            "critical".parse::<Selection<Severity>>().unwrap(),
            Selection::Only(Severity::Critical)
        );
        assert!("soon".parse::<Selection<i32>>().is_err());
    }

    #[test]
    fn test_clear_filters_keeps_sort() {
        let mut query = QueryState {
            search: "xss".to_string(),
            category: Selection::Only(Category::WebSecurity),
            severity: Selection::Only(Severity::High),
            sort: SortKey::Oldest,
            ..Default::default()
        };
        query.clear_filters();
        assert_eq!(query.active_filter_count(), 0);
        assert!(query.search.is_empty());
        assert_eq!(query.sort, SortKey::Oldest);
    }

    #[test]
    fn test_facets() {
        let facets = Facets::collect(&sample_reports());
        assert_eq!(facets.years, vec![2025, 2024, 2023]);
        assert_eq!(facets.categories[0], Category::CloudSecurity);
        assert!(facets.organizations.windows(2).all(|w| w[0] <= w[1]));
        assert!(facets.organizations.contains(&"HookHub".to_string()));
    }
}
