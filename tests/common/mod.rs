//! On-disk SQLite fixture shared by the integration tests.
//!
//! Tables are created from the schema registry. Geometries are WKB blobs,
//! dates ISO text and booleans 0/1, the way the marts are exported to SQLite.

#![allow(dead_code)]

use std::path::PathBuf;

use odapi::config::{ExportSettings, PoolSettings, Settings};
use odapi::engine::ConnectionPool;
use odapi::geo::{Coord, Geometry};
use odapi::planner::CompileOptions;
use odapi::schema::{ColumnType, SchemaRegistry};
use odapi::service::ExportService;
use rusqlite::{params, Connection};
use tempfile::TempDir;

pub const WINTERTHUR: i64 = 230;
pub const BERN: i64 = 351;
pub const ZURICH: i64 = 1;
pub const POPULATION: i64 = 1;
pub const VACANCY: i64 = 2;

pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl Fixture {
    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.database.path = self.path.display().to_string();
        settings
    }

    pub fn service(&self) -> ExportService {
        self.service_with(ExportSettings::default(), PoolSettings::default())
    }

    pub fn service_with(&self, export: ExportSettings, pool: PoolSettings) -> ExportService {
        let pool = ConnectionPool::open(&self.path, &pool).unwrap();
        ExportService::new(pool, CompileOptions::default(), export)
    }
}

/// Empty database with every registry table.
pub fn empty_database() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("odapi.db");
    let conn = Connection::open(&path).unwrap();
    for table in SchemaRegistry::global().tables() {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, sql_type(c.column_type)))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE \"{}\" ({});",
            table.name,
            columns.join(", ")
        ))
        .unwrap();
    }
    Fixture { _dir: dir, path }
}

fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int | ColumnType::Bool => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Text | ColumnType::Date => "TEXT",
        ColumnType::Geometry => "BLOB",
    }
}

pub fn point(x: f64, y: f64) -> Vec<u8> {
    Geometry::Point(Some([x, y].into())).to_wkb()
}

pub fn square(x: f64, y: f64, size: f64) -> Vec<u8> {
    let ring = [
        [x, y],
        [x + size, y],
        [x + size, y + size],
        [x, y + size],
        [x, y],
    ];
    Geometry::Polygon(vec![ring.into_iter().map(Coord::from).collect()]).to_wkb()
}

/// One fact row. Groups 2 to 4 are always totals.
#[derive(Clone)]
pub struct Fact {
    pub indicator_id: i64,
    pub geo_code: &'static str,
    pub geo_value: i64,
    pub knowledge_from: &'static str,
    pub knowledge_to: Option<&'static str>,
    pub period_ref_from: &'static str,
    pub period_ref: &'static str,
    /// `(group_value_1_id, is_total)`.
    pub group_1: (i64, bool),
    pub value: f64,
}

impl Fact {
    pub fn current(indicator_id: i64, geo_code: &'static str, geo_value: i64, value: f64) -> Self {
        Self {
            indicator_id,
            geo_code,
            geo_value,
            knowledge_from: "2021-01-01",
            knowledge_to: None,
            period_ref_from: "2020-01-01",
            period_ref: "2020-12-31",
            group_1: (10, true),
            value,
        }
    }

    pub fn insert(&self, conn: &Connection) {
        conn.execute(
            "INSERT INTO mart_ogd_api (
                indicator_id, geo_code, geo_value, knowledge_date_from, knowledge_date_to,
                period_type, period_code, period_ref_from, period_ref,
                group_1_id, group_value_1_id, _group_value_1_is_total,
                _group_value_2_is_total, _group_value_3_is_total, _group_value_4_is_total,
                indicator_value_numeric, indicator_value_text, source_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'year', 'Y', ?6, ?7, 1, ?8, ?9, 1, 1, 1, ?10, NULL, 1)",
            params![
                self.indicator_id,
                self.geo_code,
                self.geo_value,
                self.knowledge_from,
                self.knowledge_to,
                self.period_ref_from,
                self.period_ref,
                self.group_1.0,
                self.group_1.1,
                self.value,
            ],
        )
        .unwrap();
    }
}

/// Two cantons, districts and municipalities with a handful of
/// population and vacancy facts.
pub fn sample_database() -> Fixture {
    let fixture = empty_database();
    let conn = fixture.connection();

    conn.execute_batch(
        "INSERT INTO dim_source VALUES (1, 'BFS STATPOP');
         INSERT INTO dim_group VALUES (1, 'Alter');
         INSERT INTO dim_group_value VALUES (10, 'Total'), (11, '0-19'), (12, '20+');
         INSERT INTO seed_indicator VALUES
            (1, 'Einwohner', 'Bevölkerung', 'Bestand', NULL, NULL, 'Anzahl', 'Ständige Wohnbevölkerung'),
            (2, 'Leerwohnungen', 'Bau und Wohnen', NULL, NULL, NULL, '%', NULL);
         INSERT INTO mart_available_indicator
            SELECT indicator_id, 'polg', indicator_name, topic_1, topic_2, topic_3, topic_4,
                   indicator_unit, indicator_description
            FROM seed_indicator;
         INSERT INTO mart_available_indicator
            SELECT indicator_id, 'kant', indicator_name, topic_1, topic_2, topic_3, topic_4,
                   indicator_unit, indicator_description
            FROM seed_indicator WHERE indicator_id = 1;",
    )
    .unwrap();

    let geometries = |x: f64, y: f64| {
        (
            square(x, y, 0.2),
            square(x, y, 0.2),
            square(x, y, 0.2),
            square(x, y, 0.2),
            point(x + 0.1, y + 0.1),
        )
    };
    for (id, name, x, y) in [(ZURICH, "Zürich", 8.5, 47.4), (2, "Bern", 7.4, 46.9)] {
        let (border, s50, s100, s500, center) = geometries(x, y);
        conn.execute(
            "INSERT INTO dim_kanton_latest VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, name, border, s50, s100, s500, center],
        )
        .unwrap();
    }
    for (id, name, kanton, x, y) in [(110, "Winterthur", ZURICH, 8.7, 47.5), (246, "Bern-Mittelland", 2, 7.4, 46.9)] {
        let (border, s50, s100, s500, center) = geometries(x, y);
        conn.execute(
            "INSERT INTO dim_bezirk_latest VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id, name, kanton, border, s50, s100, s500, center],
        )
        .unwrap();
    }
    for (id, name, bezirk, kanton, x, y) in [
        (WINTERTHUR, "Winterthur", 110, ZURICH, 8.72, 47.5),
        (BERN, "Bern", 246, 2, 7.44, 46.95),
    ] {
        let (border, s50, s100, s500, center) = geometries(x, y);
        conn.execute(
            "INSERT INTO dim_gemeinde_latest VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![id, name, bezirk, kanton, border, s50, s100, s500, center],
        )
        .unwrap();
        for year in [2010, 2020] {
            conn.execute(
                "INSERT INTO dim_gemeinde VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    format!("{year}-01-01"),
                    year,
                    id,
                    id + 10_000,
                    name,
                    bezirk,
                    kanton,
                    square(x, y, 0.2),
                    square(x, y, 0.2),
                    square(x, y, 0.2),
                    square(x, y, 0.2),
                    point(x, y),
                ],
            )
            .unwrap();
        }
    }

    // Winterthur population: a superseded 2019 value, the current 2019
    // value with an age breakdown, and the current 2020 value.
    let superseded = Fact {
        knowledge_from: "2020-01-01",
        knowledge_to: Some("2021-01-01"),
        period_ref_from: "2019-01-01",
        period_ref: "2019-12-31",
        ..Fact::current(POPULATION, "polg", WINTERTHUR, 111_000.0)
    };
    let current_2019 = Fact {
        knowledge_from: "2021-01-01",
        knowledge_to: None,
        value: 111_851.0,
        ..superseded.clone()
    };
    superseded.insert(&conn);
    current_2019.insert(&conn);
    Fact {
        group_1: (11, false),
        value: 20_000.0,
        ..current_2019.clone()
    }
    .insert(&conn);
    Fact {
        group_1: (12, false),
        value: 91_851.0,
        ..current_2019
    }
    .insert(&conn);
    Fact::current(POPULATION, "polg", WINTERTHUR, 114_220.0).insert(&conn);
    Fact::current(VACANCY, "polg", WINTERTHUR, 0.5).insert(&conn);
    Fact::current(POPULATION, "polg", BERN, 134_591.0).insert(&conn);
    Fact::current(POPULATION, "kant", ZURICH, 1_553_423.0).insert(&conn);

    fixture
}

/// `rows` current Winterthur facts of indicator 99. Needs the sample
/// dimensions to join.
pub fn bulk_facts(fixture: &Fixture, rows: u64) {
    let conn = fixture.connection();
    conn.execute(
        "INSERT INTO mart_ogd_api (
            indicator_id, geo_code, geo_value, knowledge_date_from, knowledge_date_to,
            period_type, period_code, period_ref_from, period_ref,
            group_1_id, group_value_1_id, _group_value_1_is_total,
            _group_value_2_is_total, _group_value_3_is_total, _group_value_4_is_total,
            indicator_value_numeric, indicator_value_text, source_id
        )
        WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < ?1)
        SELECT 99, 'polg', 230, '2021-01-01', NULL, 'day', 'D', '2000-01-01', '2000-01-01',
               1, 10, 1, 1, 1, 1, i, NULL, 1
        FROM n",
        params![rows as i64],
    )
    .unwrap();
}
