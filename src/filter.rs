//! Cascading category filter over the ranking table.
//!
//! Each of the four category levels carries a [`LevelSelection`]. A row passes
//! a level when the selection is empty, when its category is one of the
//! selected values, or when it is uncategorized at that level and the
//! selection asks for [`CategoryChoice::Uncategorized`]. Levels combine with
//! logical AND.
//!
//! The options offered for level N are derived from the rows already passing
//! levels 1..N-1, so a choice is never offered that cannot co-occur with the
//! shallower selections. Masks themselves are always evaluated over the full
//! table.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ranking::{CategoryLevel, RankingRow};

/// Display label of the "uncategorized" choice
pub const UNCATEGORIZED_LABEL: &str = "(Uncategorized)";

/// A single entry of a level selection
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CategoryChoice {
    /// Match rows whose category equals this value
    Value(String),
    /// Match rows whose category is empty at this level
    Uncategorized,
}

impl CategoryChoice {
    /// Parse a label as submitted by the dashboard
    pub fn from_label(label: &str) -> Self {
        if label == UNCATEGORIZED_LABEL {
            CategoryChoice::Uncategorized
        } else {
            CategoryChoice::Value(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CategoryChoice::Value(value) => value,
            CategoryChoice::Uncategorized => UNCATEGORIZED_LABEL,
        }
    }

    fn matches(&self, category: &str) -> bool {
        match self {
            CategoryChoice::Value(value) => value == category,
            CategoryChoice::Uncategorized => category.is_empty(),
        }
    }
}

/// The choices made at one level; empty means "match everything"
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSelection {
    pub choices: Vec<CategoryChoice>,
}

impl LevelSelection {
    pub fn new(choices: Vec<CategoryChoice>) -> Self {
        LevelSelection { choices }
    }

    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        LevelSelection {
            choices: labels
                .iter()
                .map(|label| CategoryChoice::from_label(label.as_ref()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.choices.iter().map(CategoryChoice::label).collect()
    }

    /// Whether a category value passes this level
    pub fn matches(&self, category: &str) -> bool {
        self.choices.is_empty() || self.choices.iter().any(|choice| choice.matches(category))
    }
}

/// Selections for all four levels, shallowest first
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySelection {
    pub levels: [LevelSelection; 4],
}

impl CategorySelection {
    pub fn level(&self, level: CategoryLevel) -> &LevelSelection {
        &self.levels[level.index()]
    }

    pub fn set(&mut self, level: CategoryLevel, selection: LevelSelection) {
        self.levels[level.index()] = selection;
    }

    /// The deepest level with a non-empty selection
    pub fn deepest_active(&self) -> Option<(CategoryLevel, &LevelSelection)> {
        CategoryLevel::ALL
            .iter()
            .rev()
            .map(|&level| (level, self.level(level)))
            .find(|(_, selection)| !selection.is_empty())
    }
}

/// Options the dashboard may offer for one level
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelOptions {
    /// Distinct non-empty values, sorted
    pub values: Vec<String>,
    /// At least one candidate row is uncategorized at this level
    pub has_uncategorized: bool,
}

impl LevelOptions {
    /// Labels in display order: concrete values, then the uncategorized choice
    pub fn labels(&self) -> Vec<String> {
        let mut labels = self.values.clone();
        if self.has_uncategorized {
            labels.push(UNCATEGORIZED_LABEL.to_string());
        }
        labels
    }

    pub fn is_disabled(&self) -> bool {
        self.values.is_empty() && !self.has_uncategorized
    }
}

/// Boolean row mask for a single level
pub fn level_mask(rows: &[RankingRow], level: CategoryLevel, selection: &LevelSelection) -> Vec<bool> {
    rows.iter()
        .map(|row| selection.matches(row.category(level)))
        .collect()
}

/// Options for `level`, computed from the rows set in `prior_mask`
pub fn derive_options(rows: &[RankingRow], level: CategoryLevel, prior_mask: &[bool]) -> LevelOptions {
    let mut values = BTreeSet::new();
    let mut has_uncategorized = false;

    for (row, _) in rows.iter().zip(prior_mask).filter(|(_, keep)| **keep) {
        let category = row.category(level);
        if category.is_empty() {
            has_uncategorized = true;
        } else {
            values.insert(category);
        }
    }

    LevelOptions {
        values: values.into_iter().map(str::to_string).collect(),
        has_uncategorized,
    }
}

/// Result of running the four-level cascade
#[derive(Clone, Debug)]
pub struct Cascade {
    /// Options offered at each level, shallowest first
    pub options: [LevelOptions; 4],
    /// Conjunction of the four level masks
    pub mask: Vec<bool>,
}

/// Derive the options of every level and the combined category mask
pub fn cascade(rows: &[RankingRow], selection: &CategorySelection) -> Cascade {
    let mut mask = vec![true; rows.len()];
    let mut options: [LevelOptions; 4] = Default::default();

    for level in CategoryLevel::ALL {
        options[level.index()] = derive_options(rows, level, &mask);
        let level_mask = level_mask(rows, level, selection.level(level));
        and_assign(&mut mask, &level_mask);
    }

    Cascade { options, mask }
}

fn and_assign(mask: &mut [bool], other: &[bool]) {
    for (keep, other) in mask.iter_mut().zip(other) {
        *keep &= *other;
    }
}

/// Inclusive calendar date range
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Everything a user can set on the detailed analysis view
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DashboardFilter {
    pub categories: CategorySelection,
    /// No date filtering when absent
    pub date_range: Option<DateRange>,
    /// Keep only rows flagged as cannibalization
    pub conflicts_only: bool,
}

/// Rows that passed a [`DashboardFilter`], with the options for each level
#[derive(Clone, Debug)]
pub struct FilterResult<'a> {
    pub options: [LevelOptions; 4],
    pub rows: Vec<&'a RankingRow>,
}

impl DashboardFilter {
    /// Final row mask: categories AND date range AND conflicts-only
    pub fn mask(&self, rows: &[RankingRow]) -> Vec<bool> {
        let mut mask = cascade(rows, &self.categories).mask;
        self.restrict(rows, &mut mask);
        mask
    }

    /// Run the filter, keeping the derived options for the dashboard
    pub fn run<'a>(&self, rows: &'a [RankingRow]) -> FilterResult<'a> {
        let Cascade { options, mut mask } = cascade(rows, &self.categories);
        self.restrict(rows, &mut mask);

        let rows = rows
            .iter()
            .zip(&mask)
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();

        FilterResult { options, rows }
    }

    fn restrict(&self, rows: &[RankingRow], mask: &mut [bool]) {
        for (row, keep) in rows.iter().zip(mask.iter_mut()) {
            if let Some(range) = &self.date_range {
                *keep &= range.contains(row.date);
            }
            if self.conflicts_only {
                *keep &= row.is_cannibalization;
            }
        }
    }
}
