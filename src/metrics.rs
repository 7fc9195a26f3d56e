//! Position buckets, day-over-day keyword deltas and overview figures.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::filter::CategorySelection;
use crate::ranking::RankingRow;

/// Position-range classes; they partition every possible position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PositionBucket {
    Top1To3,
    Top4To10,
    Top11To20,
    Top21To100,
    Beyond100,
}

impl PositionBucket {
    /// All buckets, best first
    pub const ALL: [PositionBucket; 5] = [
        PositionBucket::Top1To3,
        PositionBucket::Top4To10,
        PositionBucket::Top11To20,
        PositionBucket::Top21To100,
        PositionBucket::Beyond100,
    ];

    /// Buckets drawn in the distribution chart
    pub const CHARTED: [PositionBucket; 4] = [
        PositionBucket::Top1To3,
        PositionBucket::Top4To10,
        PositionBucket::Top11To20,
        PositionBucket::Top21To100,
    ];

    /// Classify a position; unranked keywords fall beyond 100
    pub fn classify(position: Option<i32>) -> Self {
        match position {
            None => PositionBucket::Beyond100,
            Some(p) if p <= 3 => PositionBucket::Top1To3,
            Some(p) if p <= 10 => PositionBucket::Top4To10,
            Some(p) if p <= 20 => PositionBucket::Top11To20,
            Some(p) if p <= 100 => PositionBucket::Top21To100,
            Some(_) => PositionBucket::Beyond100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PositionBucket::Top1To3 => "TOP 1-3",
            PositionBucket::Top4To10 => "TOP 4-10",
            PositionBucket::Top11To20 => "TOP 11-20",
            PositionBucket::Top21To100 => "TOP 21-100",
            PositionBucket::Beyond100 => "> 100",
        }
    }

    /// Chart colour as an RGB triple
    pub fn color(self) -> (u8, u8, u8) {
        match self {
            PositionBucket::Top1To3 => (0xF4, 0xD0, 0x3F),
            PositionBucket::Top4To10 => (0xAE, 0xD6, 0xF1),
            PositionBucket::Top11To20 => (0x85, 0xC1, 0xE9),
            PositionBucket::Top21To100 => (0x5D, 0xAD, 0xE2),
            PositionBucket::Beyond100 => (0xB0, 0xB0, 0xB0),
        }
    }
}

impl fmt::Display for PositionBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Statistics for one bucket on the latest filtered date
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BucketStats {
    pub bucket: PositionBucket,
    pub label: &'static str,
    /// Distinct keywords in the bucket on the latest date
    pub total: usize,
    /// Keywords in the bucket on the latest date but not on the previous one
    pub new: usize,
    /// Keywords in the bucket on the previous date but not on the latest one
    pub lost: usize,
    /// Rows in the bucket per date, in date order
    pub trend: Vec<usize>,
}

impl BucketStats {
    pub fn new_display(&self) -> String {
        if self.new > 0 {
            format!("+{}", self.new)
        } else {
            "0".to_string()
        }
    }

    pub fn lost_display(&self) -> String {
        if self.lost > 0 {
            format!("-{}", self.lost)
        } else {
            "0".to_string()
        }
    }
}

/// Sorted distinct dates present in the rows
pub fn distinct_dates(rows: &[&RankingRow]) -> Vec<NaiveDate> {
    rows.iter()
        .map(|row| row.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Latest and second-latest dates; both equal when only one date exists
pub fn comparison_dates(rows: &[&RankingRow]) -> Option<(NaiveDate, NaiveDate)> {
    let dates = distinct_dates(rows);
    let latest = *dates.last()?;
    let previous = if dates.len() > 1 {
        dates[dates.len() - 2]
    } else {
        latest
    };
    Some((previous, latest))
}

fn keywords_in<'a>(
    rows: &[&'a RankingRow],
    date: NaiveDate,
    bucket: PositionBucket,
) -> BTreeSet<&'a str> {
    rows.iter()
        .filter(|row| row.date == date && PositionBucket::classify(row.position) == bucket)
        .map(|row| row.keyword.as_str())
        .collect()
}

/// Per-bucket totals, day-over-day deltas and trends for the filtered rows
///
/// Returns an empty list when there are no rows.
pub fn bucket_stats(rows: &[&RankingRow]) -> Vec<BucketStats> {
    let Some((previous, latest)) = comparison_dates(rows) else {
        return Vec::new();
    };

    let dates = distinct_dates(rows);
    let date_index: BTreeMap<NaiveDate, usize> =
        dates.iter().enumerate().map(|(i, date)| (*date, i)).collect();

    let mut trends: BTreeMap<PositionBucket, Vec<usize>> = PositionBucket::ALL
        .iter()
        .map(|bucket| (*bucket, vec![0; dates.len()]))
        .collect();
    for row in rows {
        let bucket = PositionBucket::classify(row.position);
        if let (Some(trend), Some(&i)) = (trends.get_mut(&bucket), date_index.get(&row.date)) {
            trend[i] += 1;
        }
    }

    PositionBucket::ALL
        .iter()
        .map(|&bucket| {
            let today = keywords_in(rows, latest, bucket);
            let before = keywords_in(rows, previous, bucket);
            BucketStats {
                bucket,
                label: bucket.label(),
                total: today.len(),
                new: today.difference(&before).count(),
                lost: before.difference(&today).count(),
                trend: trends.remove(&bucket).unwrap_or_default(),
            }
        })
        .collect()
}

/// Keyword counts per charted bucket on the latest date
pub fn latest_distribution(rows: &[&RankingRow]) -> Vec<(PositionBucket, usize)> {
    let Some((_, latest)) = comparison_dates(rows) else {
        return PositionBucket::CHARTED.iter().map(|b| (*b, 0)).collect();
    };
    PositionBucket::CHARTED
        .iter()
        .map(|&bucket| {
            let count = rows
                .iter()
                .filter(|row| row.date == latest && PositionBucket::classify(row.position) == bucket)
                .count();
            (bucket, count)
        })
        .collect()
}

/// Mean of the ranked positions, ignoring unranked rows
pub fn mean_position<'a, I>(rows: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a RankingRow>,
{
    let (sum, count) = rows
        .into_iter()
        .filter_map(|row| row.position)
        .fold((0i64, 0usize), |(sum, count), p| (sum + p as i64, count + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Daily mean position; dates without any ranked row are skipped
pub fn daily_average(rows: &[&RankingRow]) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&RankingRow>> = BTreeMap::new();
    for row in rows {
        by_date.entry(row.date).or_default().push(row);
    }
    by_date
        .into_iter()
        .filter_map(|(date, day_rows)| mean_position(day_rows).map(|mean| (date, mean)))
        .collect()
}

/// Project health figures shown on the overview tab
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overview {
    pub latest_date: Option<NaiveDate>,
    /// Mean position on the latest date
    pub average_position: Option<f64>,
    /// Distinct keywords across the whole history
    pub total_keywords: usize,
    /// Distinct keywords flagged as cannibalization on the latest date
    pub active_conflicts: usize,
    pub daily_average: Vec<(NaiveDate, f64)>,
}

pub fn overview(rows: &[&RankingRow]) -> Overview {
    let latest_date = rows.iter().map(|row| row.date).max();
    let latest_rows: Vec<&RankingRow> = rows
        .iter()
        .copied()
        .filter(|row| Some(row.date) == latest_date)
        .collect();

    let total_keywords = rows
        .iter()
        .map(|row| row.keyword.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    let active_conflicts = latest_rows
        .iter()
        .filter(|row| row.is_cannibalization)
        .map(|row| row.keyword.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    Overview {
        latest_date,
        average_position: mean_position(latest_rows.iter().copied()),
        total_keywords,
        active_conflicts,
        daily_average: daily_average(rows),
    }
}

/// A named line of (date, position) points
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// Legend name of the summary line, taken from the deepest active level
pub fn summary_series_name(selection: &CategorySelection) -> String {
    match selection.deepest_active() {
        Some((_, chosen)) => format!("Average: {}", chosen.labels().join(", ")),
        None => "Segmented overall average".to_string(),
    }
}

/// Series for the detail chart: one averaged line, or one line per keyword
pub fn detail_series(
    rows: &[&RankingRow],
    selection: &CategorySelection,
    per_keyword: bool,
) -> Vec<Series> {
    if !per_keyword {
        return vec![Series {
            name: summary_series_name(selection),
            points: daily_average(rows),
        }];
    }

    let mut by_keyword: BTreeMap<&str, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for row in rows {
        if let Some(position) = row.position {
            by_keyword
                .entry(row.keyword.as_str())
                .or_default()
                .push((row.date, position as f64));
        }
    }
    by_keyword
        .into_iter()
        .map(|(keyword, mut points)| {
            points.sort_by_key(|(date, _)| *date);
            Series {
                name: keyword.to_string(),
                points,
            }
        })
        .collect()
}
