use chrono::NaiveDate;
use seo_dashboard::error::DashboardError;
use seo_dashboard::downloader::{RawTable, to_csv};
use seo_dashboard::loader::from_csv;
use seo_dashboard::ranking::RankingRow;
use std::fs;
use tempfile::tempdir;

#[test]
fn loads_english_headers_sorted_by_date() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rankings.csv");
    fs::write(
        &path,
        "date,keyword,position,category_1,category_2,found_url,is_cannibalization,cannibalization_detail\n\
         2024-01-02,boots,4,shoes,winter,https://shop.example/boots,true,\"{\"\"data\"\":[{\"\"pos\"\":4}]}\"\n\
         2024-01-01,boots,7.0,shoes,winter,https://shop.example/boots,false,\n\
         2024-01-01,sandals,,shoes,,,,\n",
    )
    .unwrap();

    let table = from_csv(&path).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.date_bounds(),
        Some((
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        ))
    );

    let latest = &table.rows[2];
    assert_eq!(latest.position, Some(4));
    assert!(latest.is_cannibalization);
    assert_eq!(latest.cannibalization_detail.as_deref(), Some(r#"{"data":[{"pos":4}]}"#));

    let sandals = table.rows.iter().find(|row| row.keyword == "sandals").unwrap();
    assert_eq!(sandals.position, None);
    assert_eq!(sandals.categories[1], "");
    assert_eq!(sandals.categories[3], "");
}

#[test]
fn loads_legacy_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("legacy.csv");
    fs::write(
        &path,
        "fecha,keyword,posicion,categoria_1,url_encontrada,es_canibalizacion\n\
         2024-05-01 00:00:00,mochilas,12,bolsos,https://tienda.example/mochilas,False\n",
    )
    .unwrap();

    let table = from_csv(&path).unwrap();
    let row = &table.rows[0];
    assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    assert_eq!(row.position, Some(12));
    assert_eq!(row.categories[0], "bolsos");
    assert!(!row.is_cannibalization);
}

#[test]
fn bad_rows_report_their_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.csv");
    fs::write(&path, "date,keyword,position\n2024-01-01,a,1\nyesterday,b,2\n").unwrap();

    match from_csv(&path) {
        Err(DashboardError::Csv { line, message }) => {
            assert_eq!(line, 3);
            assert!(message.contains("yesterday"));
        }
        other => panic!("expected a CSV error, got {:?}", other),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        from_csv(dir.path().join("absent.csv")),
        Err(DashboardError::Io(_))
    ));
}

#[test]
fn exported_csv_loads_back() {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let rows = vec![
        RankingRow::new(date, "boots, leather", Some(3))
            .with_categories(&["shoes", "winter\nsale"])
            .with_url("https://shop.example/boots"),
        RankingRow::new(date, "say \"hi\"", None).with_categories(&["gifts"]),
    ];
    let refs: Vec<&RankingRow> = rows.iter().collect();

    let dir = tempdir().unwrap();
    let path = dir.path().join("export.csv");
    fs::write(&path, to_csv(&RawTable::build(&refs, false))).unwrap();

    let table = from_csv(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0].keyword, "boots, leather");
    assert_eq!(table.rows[0].categories[1], "winter\nsale");
    assert_eq!(table.rows[0].position, Some(3));
    assert_eq!(table.rows[1].keyword, "say \"hi\"");
    assert_eq!(table.rows[1].position, None);
}

#[test]
fn multi_line_conflict_detail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pretty.csv");
    fs::write(
        &path,
        "date,keyword,position,cannibalization_detail\n2024-06-01,a,5,\"{\n \"\"data\"\": []\n}\"\n2024-06-02,a,4,\n",
    )
    .unwrap();

    let table = from_csv(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[0].cannibalization_detail.as_deref(), Some("{\n \"data\": []\n}"));
    assert_eq!(table.rows[1].position, Some(4));
}
