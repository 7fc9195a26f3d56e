use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::Query;
use chrono::NaiveDate;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::cache::TimedCache;
use crate::config::Config;
use crate::downloader::{self, RawTable};
use crate::filter::{CategorySelection, DashboardFilter, DateRange, LevelOptions, LevelSelection};
use crate::graph::{self, GraphOptions};
use crate::loader::DataSource;
use crate::login::{self, PasswordGate, SessionStore};
use crate::metrics::{self, BucketStats, Overview, PositionBucket, Series};
use crate::ranking::{CategoryLevel, RankingRow, RankingTable};

const NO_DATA_MESSAGE: &str = "No data loaded.";
const EMPTY_FILTER_MESSAGE: &str = "No data for this combination of filters.";
const NO_RANKED_MESSAGE: &str = "No ranked positions for this selection.";

/// Shared server state: the data source, the table cache and the sessions
pub struct AppState {
    source: DataSource,
    cache: Mutex<TimedCache<TableLoad>>,
    pub(crate) gate: PasswordGate,
    pub(crate) sessions: SessionStore,
}

/// Outcome of fetching the ranking table for a request
#[derive(Clone, Debug)]
pub enum TableLoad {
    Ready(Arc<RankingTable>),
    /// The data source failed; the message is shown to the user
    Failed(String),
}

impl AppState {
    pub fn new(source: DataSource, gate: PasswordGate, ttl: Duration) -> Self {
        AppState {
            source,
            cache: Mutex::new(TimedCache::new(ttl)),
            gate,
            sessions: SessionStore::new(),
        }
    }

    /// The cached load outcome, reloading it wholesale once it has expired
    ///
    /// A failure is logged once and served from the cache like a table until
    /// the entry expires.
    pub async fn table(&self) -> TableLoad {
        let mut cache = self.cache.lock().await;
        if let Some(load) = cache.get(Instant::now()) {
            return load.as_ref().clone();
        }

        let load = match self.source.load().await {
            Ok(table) => TableLoad::Ready(Arc::new(table)),
            Err(e) => {
                error!("failed to load rankings from {}: {}", self.source.describe(), e);
                TableLoad::Failed(format!("Connection error: {}", e))
            }
        };
        cache.store(load, Instant::now()).as_ref().clone()
    }
}

/// Query parameters of the detailed analysis view
#[derive(Debug, Default, Deserialize)]
pub struct DetailQuery {
    #[serde(default)]
    pub l1: Vec<String>,
    #[serde(default)]
    pub l2: Vec<String>,
    #[serde(default)]
    pub l3: Vec<String>,
    #[serde(default)]
    pub l4: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub conflicts_only: bool,
    /// Draw one line per keyword instead of the averaged line
    #[serde(default)]
    pub per_keyword: bool,
}

impl DetailQuery {
    pub fn filter(&self) -> DashboardFilter {
        let mut categories = CategorySelection::default();
        for (level, labels) in CategoryLevel::ALL.iter().zip([&self.l1, &self.l2, &self.l3, &self.l4]) {
            categories.set(*level, LevelSelection::from_labels(labels.as_slice()));
        }

        // A date range applies only when both ends are given
        let date_range = match (self.start, self.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        };

        DashboardFilter {
            categories,
            date_range,
            conflicts_only: self.conflicts_only,
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: Option<String>,
}

#[derive(Serialize)]
struct OverviewResponse {
    status: &'static str,
    #[serde(flatten)]
    overview: Overview,
    first_date: Option<NaiveDate>,
}

#[derive(Serialize)]
struct LevelOptionsResponse {
    level: &'static str,
    labels: Vec<String>,
    disabled: bool,
}

impl LevelOptionsResponse {
    fn new(level: CategoryLevel, options: &LevelOptions) -> Self {
        LevelOptionsResponse {
            level: level.label(),
            labels: options.labels(),
            disabled: options.is_disabled(),
        }
    }
}

#[derive(Serialize)]
struct BucketRow {
    #[serde(flatten)]
    stats: BucketStats,
    new_display: String,
    lost_display: String,
}

#[derive(Serialize)]
struct DetailResponse {
    status: &'static str,
    message: Option<String>,
    options: Vec<LevelOptionsResponse>,
    record_count: usize,
    buckets: Vec<BucketRow>,
    distribution: Vec<(PositionBucket, usize)>,
    series: Vec<Series>,
    table: Option<RawTable>,
}

/// Build the router; every route except the login pages requires a session
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/overview", get(get_overview))
        .route("/api/detail", get(get_detail))
        .route("/chart/overview.png", get(overview_chart))
        .route("/chart/detail.png", get(detail_chart))
        .route("/chart/distribution.png", get(distribution_chart))
        .route("/export/csv", get(export_csv))
        .route("/export/xlsx", get(export_xlsx))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route("/login", get(login::serve_login_page).post(login::handle_login))
        .route("/logout", get(login::handle_logout))
        .merge(protected)
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let source = config.data_source()?;
    let gate = PasswordGate::new(&config.dashboard_pass)?;
    let state = Arc::new(AppState::new(source, gate, config.cache_ttl()));

    let app = router(state);

    // Start server
    let listener = TcpListener::bind(config.bind).await?;
    info!("Listening on http://{}", config.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

fn no_data(message: String) -> Response {
    Json(StatusResponse {
        status: "no_data",
        message: Some(message),
    })
    .into_response()
}

// Fetch the table, answering "no data" when it is unavailable or empty
async fn loaded_table(state: &AppState) -> Result<Arc<RankingTable>, Response> {
    match state.table().await {
        TableLoad::Ready(table) if !table.is_empty() => Ok(table),
        TableLoad::Ready(_) => Err(no_data(NO_DATA_MESSAGE.to_string())),
        TableLoad::Failed(message) => Err(no_data(message)),
    }
}

async fn get_overview(State(state): State<Arc<AppState>>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let rows: Vec<&RankingRow> = table.rows.iter().collect();
    Json(OverviewResponse {
        status: "ok",
        overview: metrics::overview(&rows),
        first_date: table.date_bounds().map(|(first, _)| first),
    })
    .into_response()
}

async fn get_detail(State(state): State<Arc<AppState>>, Query(query): Query<DetailQuery>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let filter = query.filter();
    let result = filter.run(&table.rows);
    let options = CategoryLevel::ALL
        .iter()
        .map(|level| LevelOptionsResponse::new(*level, &result.options[level.index()]))
        .collect();

    if result.rows.is_empty() {
        return Json(DetailResponse {
            status: "empty",
            message: Some(EMPTY_FILTER_MESSAGE.to_string()),
            options,
            record_count: 0,
            buckets: Vec::new(),
            distribution: Vec::new(),
            series: Vec::new(),
            table: None,
        })
        .into_response();
    }

    let buckets = metrics::bucket_stats(&result.rows)
        .into_iter()
        .map(|stats| BucketRow {
            new_display: stats.new_display(),
            lost_display: stats.lost_display(),
            stats,
        })
        .collect();

    Json(DetailResponse {
        status: "ok",
        message: Some(format!("Found {} records for this selection.", result.rows.len())),
        options,
        record_count: result.rows.len(),
        buckets,
        distribution: metrics::latest_distribution(&result.rows),
        series: metrics::detail_series(&result.rows, &filter.categories, query.per_keyword),
        table: Some(RawTable::build(&result.rows, filter.conflicts_only)),
    })
    .into_response()
}

fn png_response(rendered: Result<Vec<u8>, Box<dyn std::error::Error>>) -> Response {
    match rendered {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(e) => {
            error!("chart rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Chart rendering failed").into_response()
        }
    }
}

fn empty_filter() -> Response {
    (StatusCode::NOT_FOUND, EMPTY_FILTER_MESSAGE).into_response()
}

// Unranked rows contribute no points to a position chart
fn has_points(series: &[Series]) -> bool {
    series.iter().any(|line| !line.points.is_empty())
}

fn no_ranked_positions() -> Response {
    (StatusCode::NOT_FOUND, NO_RANKED_MESSAGE).into_response()
}

async fn overview_chart(State(state): State<Arc<AppState>>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let rows: Vec<&RankingRow> = table.rows.iter().collect();
    let series = vec![Series {
        name: "Average position".to_string(),
        points: metrics::daily_average(&rows),
    }];
    if !has_points(&series) {
        return no_ranked_positions();
    }
    let options = GraphOptions {
        title: "Global average ranking".to_string(),
        y_label: "Average position (1 is best)".to_string(),
        ..GraphOptions::default()
    };
    png_response(graph::create_line_chart(&series, &options))
}

async fn detail_chart(State(state): State<Arc<AppState>>, Query(query): Query<DetailQuery>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let filter = query.filter();
    let result = filter.run(&table.rows);
    if result.rows.is_empty() {
        return empty_filter();
    }

    let series = metrics::detail_series(&result.rows, &filter.categories, query.per_keyword);
    if !has_points(&series) {
        return no_ranked_positions();
    }
    let title = if query.per_keyword {
        "Detailed evolution per keyword"
    } else {
        "Average evolution (summary view)"
    };
    let options = GraphOptions {
        title: title.to_string(),
        ..GraphOptions::default()
    };
    png_response(graph::create_line_chart(&series, &options))
}

async fn distribution_chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let result = query.filter().run(&table.rows);
    if result.rows.is_empty() {
        return empty_filter();
    }

    let options = GraphOptions {
        title: "Position distribution".to_string(),
        x_label: "Position range".to_string(),
        y_label: "Keywords".to_string(),
        width: 600,
        height: 400,
    };
    png_response(graph::create_distribution_chart(
        &metrics::latest_distribution(&result.rows),
        &options,
    ))
}

async fn export_csv(State(state): State<Arc<AppState>>, Query(query): Query<DetailQuery>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let filter = query.filter();
    let result = filter.run(&table.rows);
    let csv = downloader::to_csv(&RawTable::build(&result.rows, filter.conflicts_only));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"rankings.csv\""),
        ],
        csv,
    )
        .into_response()
}

async fn export_xlsx(State(state): State<Arc<AppState>>, Query(query): Query<DetailQuery>) -> Response {
    let table = match loaded_table(&state).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let filter = query.filter();
    let result = filter.run(&table.rows);
    match downloader::to_xlsx(&RawTable::build(&result.rows, filter.conflicts_only)) {
        Ok(xlsx) => (
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"rankings.xlsx\""),
            ],
            xlsx,
        )
            .into_response(),
        Err(e) => {
            error!("xlsx export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Export failed").into_response()
        }
    }
}
