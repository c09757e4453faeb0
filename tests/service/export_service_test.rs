#[path = "../common/mod.rs"]
mod common;

use common::{bulk_facts, sample_database, Fact, POPULATION, WINTERTHUR};
use odapi::engine::EngineError;
use odapi::error::{ErrorKind, ServiceError};
use odapi::export::ExportFormat;
use odapi::geo::GeoLevel;
use odapi::planner::render_tree;
use odapi::request::{ExportParams, SnapshotParams, ValuesParams};
use odapi::service::ExportService;
use serde_json::Value as JsonValue;

fn expect_error<T>(result: Result<T, ServiceError>) -> ServiceError {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    }
}

#[tokio::test]
async fn test_winterthur_point_portrait() {
    let fixture = sample_database();
    let params = ExportParams {
        geo_code: Some("municipality".into()),
        geo_value: Some(WINTERTHUR.to_string()),
        geometry_mode: Some("point".into()),
        format: Some("geojson".into()),
        ..Default::default()
    };
    let response = fixture.service().export(&params).await.unwrap();
    assert_eq!(response.format, ExportFormat::GeoJson);
    let body: JsonValue = serde_json::from_slice(&response.into_bytes().await.unwrap()).unwrap();

    let features = body["features"].as_array().unwrap();
    // Current totals only: population 2019 and 2020, vacancy 2020.
    assert_eq!(features.len(), 3);
    for feature in features {
        assert_eq!(feature["properties"]["geo_value"], WINTERTHUR);
        assert!(feature["properties"]["knowledge_date_to"].is_null());
        assert!(feature["properties"].get("geometry").is_none());
        let geometry = &feature["geometry"];
        assert_eq!(geometry["type"], "Point");
        let x = geometry["coordinates"][0].as_f64().unwrap();
        let y = geometry["coordinates"][1].as_f64().unwrap();
        assert!((x - 8.82).abs() < 1e-9 && (y - 47.6).abs() < 1e-9, "{x} {y}");
    }
}

#[tokio::test]
async fn test_spreadsheet_over_hard_cap_writes_nothing() {
    let fixture = sample_database();
    bulk_facts(&fixture, 2_000_000);
    let service = ExportService::from_settings(&fixture.settings()).unwrap();
    let params = ExportParams {
        indicator_id: Some("99".into()),
        geo_code: Some("polg".into()),
        format: Some("spreadsheet".into()),
        ..Default::default()
    };

    let err = expect_error(service.export(&params).await);
    assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
    assert!(err.to_string().contains("2000000 rows"), "{err}");
    assert!(err.to_string().contains("1048575"), "{err}");
}

#[tokio::test]
async fn test_invalid_parameters_never_reach_the_engine() {
    let fixture = sample_database();
    let service = fixture.service();
    // Close the pool: anything that tried to acquire would fail differently.
    service.pool().close();

    let cases = [
        ExportParams {
            indicator_id: Some("1".into()),
            geo_code: Some("gemeinde".into()),
            ..Default::default()
        },
        ExportParams {
            indicator_id: Some("1".into()),
            geo_code: Some("polg".into()),
            as_of_date: Some("2021-13-01".into()),
            ..Default::default()
        },
        ExportParams {
            indicator_id: Some("1".into()),
            geo_code: Some("polg".into()),
            format: Some("shapefile".into()),
            ..Default::default()
        },
        ExportParams {
            geo_code: Some("polg".into()),
            ..Default::default()
        },
    ];
    for params in &cases {
        let err = expect_error(service.export(params).await);
        assert_eq!(err.kind(), ErrorKind::InvalidParameter, "{err}");
        assert_eq!(err.status_code(), 400);
    }

    let err = expect_error(
        service
            .snapshot(&SnapshotParams {
                geo_code: Some("kant".into()),
                year: Some("1700".into()),
                ..Default::default()
            })
            .await,
    );
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn test_engine_failure_is_reported() {
    let fixture = sample_database();
    let service = fixture.service();
    service.pool().close();
    let err = expect_error(
        service
            .values(&ValuesParams {
                geo_code: Some("kant".into()),
                ..Default::default()
            })
            .await,
    );
    assert!(matches!(err, ServiceError::Engine(EngineError::PoolClosed)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_mid_stream_failure_ends_the_body() {
    let fixture = sample_database();
    {
        let conn = fixture.connection();
        conn.execute(
            "INSERT INTO dim_gemeinde_latest (gemeinde_bfs_id, gemeinde_name, bezirk_bfs_id, kanton_bfs_id, geom_center)
             VALUES (999, 'Kaputt', 110, 1, x'0102')",
            [],
        )
        .unwrap();
        Fact::current(POPULATION, "polg", 999, 1.0).insert(&conn);
    }
    let params = ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        geometry_mode: Some("point".into()),
        ..Default::default()
    };

    // The first row is fine, so the export starts.
    let response = fixture.service().export(&params).await.unwrap();
    let err = expect_error(response.into_bytes().await);
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(err.to_string().contains("invalid geometry"), "{err}");
}

#[tokio::test]
async fn test_snapshot_export() {
    let fixture = sample_database();
    let params = SnapshotParams {
        geo_code: Some("polg".into()),
        year: Some("2020".into()),
        geometry_mode: Some("point".into()),
        ..Default::default()
    };
    let body: JsonValue = serde_json::from_slice(
        &fixture
            .service()
            .snapshot(&params)
            .await
            .unwrap()
            .into_bytes()
            .await
            .unwrap(),
    )
    .unwrap();
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    assert_eq!(features[0]["properties"]["gemeinde_name"], "Winterthur");
    assert_eq!(features[0]["properties"]["snapshot_date"], "2020-01-01");
    assert_eq!(features[0]["geometry"]["type"], "Point");
}

#[tokio::test]
async fn test_catalog() {
    let fixture = sample_database();
    let service = fixture.service();

    let municipal = service.catalog(GeoLevel::Municipality).await.unwrap();
    assert_eq!(
        municipal.iter().map(|i| i.indicator_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    let cantonal = service.catalog(GeoLevel::Canton).await.unwrap();
    assert_eq!(cantonal.len(), 1);
    assert!(service.catalog(GeoLevel::District).await.unwrap().is_empty());

    let tree = render_tree(&municipal);
    assert!(tree.contains("╙── Bevölkerung"), "{tree}");
    assert!(tree.contains("[#0001] Einwohner (Anzahl)"), "{tree}");
}

#[tokio::test]
async fn test_verify_schema() {
    let fixture = sample_database();
    fixture.service().verify_schema().await.unwrap();

    fixture
        .connection()
        .execute_batch("DROP TABLE dim_group_value;")
        .unwrap();
    let err = expect_error(fixture.service().verify_schema().await);
    assert!(matches!(err, ServiceError::Engine(EngineError::SchemaMismatch(ref issues)) if issues.len() == 1));
}

#[tokio::test]
async fn test_from_settings() {
    let fixture = sample_database();
    let service = ExportService::from_settings(&fixture.settings()).unwrap();
    let body = service
        .export(&ExportParams {
            indicator_id: Some("1".into()),
            geo_code: Some("kant".into()),
            format: Some("csv".into()),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_bytes()
        .await
        .unwrap();
    assert_eq!(String::from_utf8(body).unwrap().lines().count(), 2);

    let mut missing = fixture.settings();
    missing.database.path = "${ODAPI_TEST_MISSING_DIR}/odapi.db".into();
    assert_eq!(
        expect_error(ExportService::from_settings(&missing)).kind(),
        ErrorKind::Internal
    );
}
