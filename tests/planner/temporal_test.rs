#[path = "../common/mod.rs"]
mod common;

use chrono::NaiveDate;
use common::{empty_database, Fact, Fixture, POPULATION, WINTERTHUR};
use odapi::engine::SqliteCursor;
use odapi::export::{RowCursor, Value};
use odapi::geo::{GeoLevel, GeometryMode};
use odapi::planner::{CompileOptions, GroupExpansion, QueryCompiler};
use odapi::request::{IndicatorQuery, Page};

/// Three successive versions of one observation:
/// `[2019-01-01, 2020-01-01)`, `[2020-01-01, 2021-01-01)` and open.
fn versioned_database() -> Fixture {
    let fixture = empty_database();
    let conn = fixture.connection();
    conn.execute_batch(
        "INSERT INTO dim_source VALUES (1, 'BFS');
         INSERT INTO dim_kanton_latest (kanton_bfs_id, kanton_name) VALUES (1, 'Zürich');
         INSERT INTO dim_bezirk_latest (bezirk_bfs_id, bezirk_name, kanton_bfs_id) VALUES (110, 'Winterthur', 1);
         INSERT INTO dim_gemeinde_latest (gemeinde_bfs_id, gemeinde_name, bezirk_bfs_id, kanton_bfs_id)
            VALUES (230, 'Winterthur', 110, 1);",
    )
    .unwrap();

    let versions = [
        ("2019-01-01", Some("2020-01-01"), 1.0),
        ("2020-01-01", Some("2021-01-01"), 2.0),
        ("2021-01-01", None, 3.0),
    ];
    for (from, to, value) in versions {
        Fact {
            knowledge_from: from,
            knowledge_to: to,
            ..Fact::current(POPULATION, "polg", WINTERTHUR, value)
        }
        .insert(&conn);
    }
    fixture
}

/// Values visible at `as_of`.
fn visible(fixture: &Fixture, as_of: Option<&str>) -> Vec<f64> {
    let q = IndicatorQuery {
        indicator_id: Some(POPULATION),
        geo_level: GeoLevel::Municipality,
        geo_value: Some(WINTERTHUR),
        as_of: as_of.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        period_ref: None,
        join_indicator_meta: false,
        join_geo_meta: false,
        geometry_mode: GeometryMode::default(),
        groups: GroupExpansion::totals_only(),
        page: Page::default(),
    };
    let plan = QueryCompiler::global(CompileOptions::default())
        .compile_indicator(&q)
        .unwrap();
    let value_index = plan
        .column_names()
        .iter()
        .position(|c| *c == "indicator_value_numeric")
        .unwrap();

    let conn = fixture.connection();
    let mut stmt = conn.prepare(&plan.sql()).unwrap();
    let mut cursor = SqliteCursor::new(stmt.query([]).unwrap(), &plan.columns);
    let mut values = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        match &row[value_index] {
            Value::Float(f) => values.push(*f),
            other => panic!("unexpected value {other:?}"),
        }
    }
    values
}

#[test]
fn test_no_as_of_returns_open_version() {
    let fixture = versioned_database();
    assert_eq!(visible(&fixture, None), vec![3.0]);
}

#[test]
fn test_lower_bound_is_inclusive() {
    let fixture = versioned_database();
    assert_eq!(visible(&fixture, Some("2019-01-01")), vec![1.0]);
    assert_eq!(visible(&fixture, Some("2020-01-01")), vec![2.0]);
    assert_eq!(visible(&fixture, Some("2021-01-01")), vec![3.0]);
}

#[test]
fn test_upper_bound_is_exclusive() {
    let fixture = versioned_database();
    assert_eq!(visible(&fixture, Some("2019-12-31")), vec![1.0]);
    assert_eq!(visible(&fixture, Some("2020-12-31")), vec![2.0]);
}

#[test]
fn test_before_first_version_is_empty() {
    let fixture = versioned_database();
    assert!(visible(&fixture, Some("2018-06-30")).is_empty());
}

#[test]
fn test_far_future_sees_open_version() {
    let fixture = versioned_database();
    assert_eq!(visible(&fixture, Some("2099-01-01")), vec![3.0]);
}
