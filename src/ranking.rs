use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the four hierarchical category levels of a ranking row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryLevel {
    L1,
    L2,
    L3,
    L4,
}

impl CategoryLevel {
    /// All levels, shallowest first
    pub const ALL: [CategoryLevel; 4] = [
        CategoryLevel::L1,
        CategoryLevel::L2,
        CategoryLevel::L3,
        CategoryLevel::L4,
    ];

    /// Zero-based index of the level
    pub fn index(self) -> usize {
        match self {
            CategoryLevel::L1 => 0,
            CategoryLevel::L2 => 1,
            CategoryLevel::L3 => 2,
            CategoryLevel::L4 => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryLevel::L1 => "Level 1",
            CategoryLevel::L2 => "Level 2",
            CategoryLevel::L3 => "Level 3",
            CategoryLevel::L4 => "Level 4",
        }
    }
}

/// A single ranking observation: the position of one keyword on one date
///
/// Categories are never `None`; a missing category is stored as the empty
/// string, which the filter treats as "uncategorized".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingRow {
    /// Date of measurement
    pub date: NaiveDate,

    /// Tracked search term
    pub keyword: String,

    /// Ranking position, 1 is best; `None` when not ranked
    pub position: Option<i32>,

    /// Hierarchical classification, shallowest first
    pub categories: [String; 4],

    /// URL ranking for the keyword on that date
    pub found_url: String,

    /// True when several owned URLs compete for the keyword
    pub is_cannibalization: bool,

    /// Raw JSON text listing the competing URLs
    pub cannibalization_detail: Option<String>,
}

impl RankingRow {
    pub fn new(date: NaiveDate, keyword: &str, position: Option<i32>) -> Self {
        RankingRow {
            date,
            keyword: keyword.to_string(),
            position,
            categories: Default::default(),
            found_url: String::new(),
            is_cannibalization: false,
            cannibalization_detail: None,
        }
    }

    /// Builder-style helper that sets the categories from shallowest to deepest
    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        for (slot, value) in self.categories.iter_mut().zip(categories) {
            *slot = value.to_string();
        }
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.found_url = url.to_string();
        self
    }

    pub fn with_conflict(mut self, detail: Option<&str>) -> Self {
        self.is_cannibalization = true;
        self.cannibalization_detail = detail.map(str::to_string);
        self
    }

    pub fn category(&self, level: CategoryLevel) -> &str {
        &self.categories[level.index()]
    }
}

/// The full ranking history, held read-only after loading
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RankingTable {
    pub rows: Vec<RankingRow>,
}

impl RankingTable {
    /// Wrap rows, ordering them by date ascending (stable within a date)
    pub fn new(mut rows: Vec<RankingRow>) -> Self {
        rows.sort_by_key(|row| row.date);
        RankingTable { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Earliest and latest dates present, if any
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.iter().map(|row| row.date).min()?;
        let last = self.rows.iter().map(|row| row.date).max()?;
        Some((first, last))
    }
}
