use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use log::info;

use crate::error::DashboardError;
use crate::ranking::{RankingRow, RankingTable};

/// Where the ranking history comes from
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A CSV export of the ranking table
    Csv(PathBuf),

    /// The live PostgreSQL ranking table
    #[cfg(feature = "web")]
    Postgres(postgres::PostgresSource),
}

impl DataSource {
    /// Load the whole table, ordered by date ascending
    ///
    /// # Errors
    /// * Returns an error if the source cannot be reached or read
    pub async fn load(&self) -> Result<RankingTable, DashboardError> {
        let started = Instant::now();
        let table = match self {
            #[cfg(feature = "web")]
            DataSource::Csv(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || from_csv(path))
                    .await
                    .map_err(|e| DashboardError::Io(std::io::Error::other(e)))??
            }
            #[cfg(not(feature = "web"))]
            DataSource::Csv(path) => from_csv(path)?,
            #[cfg(feature = "web")]
            DataSource::Postgres(source) => source.load().await?,
        };
        info!(
            "loaded {} ranking rows from {} in {:?}",
            table.len(),
            self.describe(),
            started.elapsed()
        );
        Ok(table)
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::Csv(path) => format!("csv:{}", path.display()),
            #[cfg(feature = "web")]
            DataSource::Postgres(source) => format!("postgres:{}", source.table()),
        }
    }
}

/// Column names accepted in CSV headers, English first then the legacy names
const COLUMNS: [(&str, &str); 10] = [
    ("date", "fecha"),
    ("keyword", "keyword"),
    ("position", "posicion"),
    ("category_1", "categoria_1"),
    ("category_2", "categoria_2"),
    ("category_3", "categoria_3"),
    ("category_4", "categoria_4"),
    ("found_url", "url_encontrada"),
    ("is_cannibalization", "es_canibalizacion"),
    ("cannibalization_detail", "detalle_canibalizacion"),
];

/// Load ranking rows from a CSV file
///
/// The first line is a header naming the columns; `date` and `keyword` are
/// required, every other column is optional. Missing categories become the
/// empty string and an empty position means "not ranked".
///
/// # Examples
/// ```no_run
/// use seo_dashboard::loader::from_csv;
///
/// match from_csv("rankings.csv") {
///     Ok(table) => println!("Loaded {} rows", table.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<RankingTable, DashboardError> {
    let content = fs::read_to_string(filepath)?;
    let mut records = csv_records(&content)?.into_iter();

    let (_, header) = records.next().ok_or(DashboardError::Csv {
        line: 1,
        message: "CSV file is empty".to_string(),
    })?;
    let columns = header_columns(header.trim_start_matches('\u{feff}'))?;

    let mut rows = Vec::new();
    for (line_no, record) in records {
        let fields = parse_csv_row(&record);
        rows.push(parse_ranking_row(&columns, &fields, line_no)?);
    }

    Ok(RankingTable::new(rows))
}

// Split the file into logical records, each tagged with the line it starts on.
// A quoted field may span several physical lines; blank lines are skipped.
fn csv_records(content: &str) -> Result<Vec<(usize, String)>, DashboardError> {
    let mut records = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, line) in content.lines().enumerate() {
        let (start, mut record) = match pending.take() {
            Some((start, mut record)) => {
                record.push('\n');
                (start, record)
            }
            None if line.trim().is_empty() => continue,
            None => (index + 1, String::new()),
        };
        record.push_str(line);

        // Doubled quotes toggle twice, so an odd count leaves a field open
        if record.matches('"').count() % 2 == 1 {
            pending = Some((start, record));
        } else {
            records.push((start, record));
        }
    }

    if let Some((start, _)) = pending {
        return Err(DashboardError::Csv {
            line: start,
            message: "unterminated quoted field".to_string(),
        });
    }
    Ok(records)
}

// Map from canonical column name to field index
fn header_columns(header: &str) -> Result<HashMap<&'static str, usize>, DashboardError> {
    let mut columns = HashMap::new();
    for (index, name) in parse_csv_row(header).iter().enumerate() {
        let name = name.trim().to_lowercase();
        if let Some((canonical, _)) = COLUMNS
            .iter()
            .find(|(english, legacy)| name == *english || name == *legacy)
        {
            columns.insert(*canonical, index);
        }
    }

    for required in ["date", "keyword"] {
        if !columns.contains_key(required) {
            return Err(DashboardError::Csv {
                line: 1,
                message: format!("missing required column '{}'", required),
            });
        }
    }
    Ok(columns)
}

fn parse_ranking_row(
    columns: &HashMap<&'static str, usize>,
    fields: &[String],
    line: usize,
) -> Result<RankingRow, DashboardError> {
    let field = |name: &str| column_value(columns, fields, name);
    let error = |message: String| DashboardError::Csv { line, message };

    let date = parse_date(field("date")).ok_or_else(|| error(format!("invalid date '{}'", field("date"))))?;
    let position = parse_position(field("position"))
        .map_err(|_| error(format!("invalid position '{}'", field("position"))))?;
    let is_cannibalization = parse_flag(field("is_cannibalization"))
        .ok_or_else(|| error(format!("invalid flag '{}'", field("is_cannibalization"))))?;
    let detail = field("cannibalization_detail");

    Ok(RankingRow {
        date,
        keyword: field("keyword").to_string(),
        position,
        categories: [
            field("category_1").to_string(),
            field("category_2").to_string(),
            field("category_3").to_string(),
            field("category_4").to_string(),
        ],
        found_url: field("found_url").to_string(),
        is_cannibalization,
        cannibalization_detail: (!detail.is_empty()).then(|| detail.to_string()),
    })
}

fn column_value<'a>(columns: &HashMap<&'static str, usize>, fields: &'a [String], name: &str) -> &'a str {
    columns
        .get(name)
        .and_then(|&i| fields.get(i))
        .map(|value| value.trim())
        .unwrap_or("")
}

// Accepts "YYYY-MM-DD" with an optional trailing time part
fn parse_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// Positions exported through floating-point columns arrive as "5.0"
fn parse_position(value: &str) -> Result<Option<i32>, ()> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    if let Ok(position) = value.parse::<i32>() {
        return Ok(Some(position));
    }
    match value.parse::<f64>() {
        Ok(position) if position.fract() == 0.0 && position.abs() < i32::MAX as f64 => {
            Ok(Some(position as i32))
        }
        _ => Err(()),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "" | "false" | "f" | "0" | "no" => Some(false),
        "true" | "t" | "1" | "yes" => Some(true),
        _ => None,
    }
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    result.push(current_field);
    result
}

#[cfg(feature = "web")]
pub mod postgres {
    use chrono::NaiveDate;
    use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
    use std::time::Duration;

    use crate::error::DashboardError;
    use crate::ranking::{RankingRow, RankingTable};

    /// Connection settings for the ranking database
    #[derive(Debug, Clone)]
    pub struct PgSettings {
        pub host: String,
        pub port: u16,
        pub user: String,
        pub password: String,
        pub database: String,
        pub table: String,
    }

    /// PostgreSQL ranking table behind a lazily connected pool
    #[derive(Debug, Clone)]
    pub struct PostgresSource {
        pool: PgPool,
        table: String,
    }

    #[derive(sqlx::FromRow)]
    struct DbRanking {
        fecha: NaiveDate,
        keyword: Option<String>,
        posicion: Option<i32>,
        categoria_1: Option<String>,
        categoria_2: Option<String>,
        categoria_3: Option<String>,
        categoria_4: Option<String>,
        url_encontrada: Option<String>,
        es_canibalizacion: Option<bool>,
        detalle_canibalizacion: Option<String>,
    }

    impl From<DbRanking> for RankingRow {
        fn from(row: DbRanking) -> Self {
            RankingRow {
                date: row.fecha,
                keyword: row.keyword.unwrap_or_default(),
                position: row.posicion,
                categories: [
                    row.categoria_1.unwrap_or_default(),
                    row.categoria_2.unwrap_or_default(),
                    row.categoria_3.unwrap_or_default(),
                    row.categoria_4.unwrap_or_default(),
                ],
                found_url: row.url_encontrada.unwrap_or_default(),
                is_cannibalization: row.es_canibalizacion.unwrap_or(false),
                cannibalization_detail: row.detalle_canibalizacion,
            }
        }
    }

    impl PostgresSource {
        /// Build the source without connecting; the first load opens the connection
        ///
        /// # Errors
        /// * Returns an error if the table name is not a plain SQL identifier
        pub fn new(settings: PgSettings) -> Result<Self, DashboardError> {
            validate_table_name(&settings.table)?;

            let options = PgConnectOptions::new()
                .host(&settings.host)
                .port(settings.port)
                .username(&settings.user)
                .password(&settings.password)
                .database(&settings.database);
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .acquire_timeout(Duration::from_secs(10))
                .connect_lazy_with(options);

            Ok(PostgresSource {
                pool,
                table: settings.table,
            })
        }

        pub fn table(&self) -> &str {
            &self.table
        }

        pub async fn load(&self) -> Result<RankingTable, DashboardError> {
            let query = select_query(&self.table);
            let rows: Vec<DbRanking> = sqlx::query_as(&query)
                .fetch_all(&self.pool)
                .await?;
            Ok(RankingTable::new(rows.into_iter().map(RankingRow::from).collect()))
        }
    }

    pub(crate) fn select_query(table: &str) -> String {
        format!(
            "SELECT fecha::date AS fecha, keyword::text AS keyword, posicion::int4 AS posicion, \
             categoria_1::text AS categoria_1, categoria_2::text AS categoria_2, \
             categoria_3::text AS categoria_3, categoria_4::text AS categoria_4, \
             url_encontrada::text AS url_encontrada, es_canibalizacion::boolean AS es_canibalizacion, \
             detalle_canibalizacion::text AS detalle_canibalizacion \
             FROM {} ORDER BY fecha ASC",
            table
        )
    }

    // Only schema-qualified plain identifiers are interpolated into the query
    pub(crate) fn validate_table_name(table: &str) -> Result<(), DashboardError> {
        let valid = !table.is_empty()
            && table.split('.').all(|part| {
                !part.is_empty()
                    && !part.starts_with(|c: char| c.is_ascii_digit())
                    && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
        if valid {
            Ok(())
        } else {
            Err(DashboardError::Config(format!("invalid table name '{}'", table)))
        }
    }

}
