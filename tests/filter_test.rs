use chrono::NaiveDate;
use seo_dashboard::filter::{
    CategoryChoice, CategorySelection, DashboardFilter, DateRange, LevelSelection, UNCATEGORIZED_LABEL,
    cascade,
};
use seo_dashboard::ranking::{CategoryLevel, RankingRow};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

// A small catalogue spread over three days
fn sample_rows() -> Vec<RankingRow> {
    let mut rows = Vec::new();
    for d in 1..=3 {
        rows.push(
            RankingRow::new(day(d), "trail runners", Some(2))
                .with_categories(&["shoes", "running", "trail", "men"]),
        );
        rows.push(
            RankingRow::new(day(d), "road runners", Some(11))
                .with_categories(&["shoes", "running", "road"]),
        );
        rows.push(RankingRow::new(day(d), "loafers", Some(25)).with_categories(&["shoes", "casual"]));
        rows.push(RankingRow::new(day(d), "backpacks", Some(60)).with_categories(&["bags", "travel"]));
        rows.push(RankingRow::new(day(d), "gift card", None));
    }
    rows.push(
        RankingRow::new(day(3), "trail socks", Some(4))
            .with_categories(&["socks", "running", "trail"])
            .with_conflict(Some(r#"{"data":[{"pos":4,"url":"https://shop.example/socks"}]}"#)),
    );
    rows
}

fn selection(level: CategoryLevel, labels: &[&str]) -> CategorySelection {
    let mut selection = CategorySelection::default();
    selection.set(level, LevelSelection::from_labels(labels));
    selection
}

#[test]
fn empty_selection_is_identity() {
    let rows = sample_rows();
    let result = DashboardFilter::default().run(&rows);
    assert_eq!(result.rows.len(), rows.len());
    assert_eq!(
        result.options[0].labels(),
        vec!["bags", "shoes", "socks", UNCATEGORIZED_LABEL]
    );
}

#[test]
fn levels_combine_with_and() {
    let rows = sample_rows();
    let mut categories = selection(CategoryLevel::L1, &["shoes"]);
    categories.set(CategoryLevel::L2, LevelSelection::from_labels(&["running"]));
    categories.set(CategoryLevel::L3, LevelSelection::from_labels(&["trail"]));

    let filter = DashboardFilter {
        categories,
        ..DashboardFilter::default()
    };
    let result = filter.run(&rows);

    // "trail socks" matches levels 2 and 3 but not level 1
    assert_eq!(result.rows.len(), 3);
    assert!(result.rows.iter().all(|row| row.keyword == "trail runners"));
}

#[test]
fn deeper_options_follow_shallower_selections() {
    let rows = sample_rows();
    let cascade = cascade(&rows, &selection(CategoryLevel::L1, &["shoes"]));

    assert_eq!(cascade.options[1].labels(), vec!["casual", "running"]);
    assert!(!cascade.options[1].values.contains(&"travel".to_string()));
    assert_eq!(
        cascade.options[2].labels(),
        vec!["road", "trail", UNCATEGORIZED_LABEL]
    );
}

#[test]
fn uncategorized_choice_selects_empty_categories() {
    let rows = sample_rows();
    let filter = DashboardFilter {
        categories: selection(CategoryLevel::L1, &[UNCATEGORIZED_LABEL]),
        ..DashboardFilter::default()
    };
    let result = filter.run(&rows);
    assert_eq!(result.rows.len(), 3);
    assert!(result.rows.iter().all(|row| row.keyword == "gift card"));
    assert_eq!(
        filter.categories.level(CategoryLevel::L1).choices,
        vec![CategoryChoice::Uncategorized]
    );
}

#[test]
fn disabled_level_when_no_candidates() {
    let rows = sample_rows();
    let cascade = cascade(&rows, &selection(CategoryLevel::L1, &["nonexistent"]));
    assert!(cascade.options[1].is_disabled());
    assert!(cascade.mask.iter().all(|keep| !keep));
}

#[test]
fn date_range_is_inclusive() {
    let rows = sample_rows();
    let filter = DashboardFilter {
        date_range: Some(DateRange::new(day(2), day(3))),
        ..DashboardFilter::default()
    };
    let result = filter.run(&rows);
    assert_eq!(result.rows.len(), 11);
    assert!(result.rows.iter().all(|row| row.date >= day(2)));
}

#[test]
fn conflicts_only_keeps_flagged_rows() {
    let rows = sample_rows();
    let filter = DashboardFilter {
        conflicts_only: true,
        ..DashboardFilter::default()
    };
    let mask = filter.mask(&rows);
    assert_eq!(mask.iter().filter(|keep| **keep).count(), 1);

    let result = filter.run(&rows);
    assert_eq!(result.rows[0].keyword, "trail socks");
    // Options still come from the category cascade alone
    assert_eq!(result.options[0].values.len(), 3);
}

#[test]
fn selecting_every_option_matches_empty_selection() {
    let rows = sample_rows();
    for level in CategoryLevel::ALL {
        let everything = cascade(&rows, &CategorySelection::default()).options[level.index()].labels();
        let all_selected = DashboardFilter {
            categories: selection(level, &everything.iter().map(String::as_str).collect::<Vec<_>>()),
            ..DashboardFilter::default()
        };
        assert_eq!(
            all_selected.mask(&rows),
            DashboardFilter::default().mask(&rows),
            "{}",
            level.label()
        );
    }
}
