#![cfg(not(tarpaulin_include))]

use serde::Serialize;

use crate::conflicts::format_conflict_detail;
#[cfg(feature = "web")]
use crate::error::DashboardError;
use crate::ranking::RankingRow;

/// The raw-data table shown under the charts and offered for download
///
/// In conflicts-only mode the category columns are replaced by the formatted
/// cannibalization detail.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawTable {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

const DEFAULT_HEADERS: [&str; 6] = [
    "date",
    "keyword",
    "position",
    "found_url",
    "category_1",
    "category_2",
];

const CONFLICT_HEADERS: [&str; 5] = ["date", "keyword", "position", "found_url", "conflict"];

/// Column index of the position, written as a number in XLSX
#[cfg(feature = "web")]
const POSITION_COLUMN: usize = 2;

impl RawTable {
    /// Build the table for the filtered rows
    ///
    /// # Examples
    /// ```
    /// use chrono::NaiveDate;
    /// use seo_dashboard::downloader::RawTable;
    /// use seo_dashboard::ranking::RankingRow;
    ///
    /// let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    /// let row = RankingRow::new(date, "shoes", Some(3));
    /// let table = RawTable::build(&[&row], false);
    /// assert_eq!(table.rows[0][0], "2024-01-01");
    /// ```
    pub fn build(rows: &[&RankingRow], conflicts_only: bool) -> Self {
        let headers = if conflicts_only {
            CONFLICT_HEADERS.to_vec()
        } else {
            DEFAULT_HEADERS.to_vec()
        };

        let rows = rows
            .iter()
            .map(|row| {
                let mut cells = vec![
                    row.date.format("%Y-%m-%d").to_string(),
                    row.keyword.clone(),
                    row.position.map(|p| p.to_string()).unwrap_or_default(),
                    row.found_url.clone(),
                ];
                if conflicts_only {
                    cells.push(format_conflict_detail(row.cannibalization_detail.as_deref()));
                } else {
                    cells.push(row.categories[0].clone());
                    cells.push(row.categories[1].clone());
                }
                cells
            })
            .collect();

        RawTable { headers, rows }
    }
}

/// Convert the raw table to CSV format
///
/// Values containing commas, quotes or newlines are quoted, with embedded
/// quotes doubled.
pub fn to_csv(table: &RawTable) -> String {
    let mut csv_content = table.headers.join(",");
    csv_content.push('\n');

    for row in &table.rows {
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                let escaped = value.replace('"', "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Convert the raw table to XLSX format using rust_xlsxwriter
///
/// Positions are written as numbers, everything else as text.
#[cfg(feature = "web")]
pub fn to_xlsx(table: &RawTable) -> Result<Vec<u8>, DashboardError> {
    use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

    fn write(table: &RawTable) -> Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let mut worksheet = Worksheet::new();
        worksheet.set_name("Rankings")?;

        for (c, header) in table.headers.iter().enumerate() {
            worksheet.write_string(0, c as u16, *header)?;
        }

        for (r, row) in table.rows.iter().enumerate() {
            let r = (r + 1) as u32;
            for (c, value) in row.iter().enumerate() {
                match value.parse::<f64>() {
                    Ok(number) if c == POSITION_COLUMN => {
                        worksheet.write_number(r, c as u16, number)?;
                    }
                    _ => {
                        worksheet.write_string(r, c as u16, value)?;
                    }
                }
            }
        }

        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer()
    }

    write(table).map_err(|e| DashboardError::Render(e.to_string()))
}
