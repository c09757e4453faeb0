#[path = "../common/mod.rs"]
mod common;

use common::{empty_database, sample_database, WINTERTHUR};
use odapi::engine::SqliteCursor;
use odapi::export::RowCursor;
use odapi::planner::{CompileOptions, QueryCompiler};
use odapi::request::{ExportParams, ValuesParams};
use serde_json::Value as JsonValue;

fn population_params() -> ExportParams {
    ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        join_geo_meta: true,
        join_indicator_meta: true,
        expand_all: true,
        format: Some("geojson".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_round_trip_matches_rows() {
    let fixture = sample_database();
    let params = population_params();

    // Rows as the engine returns them.
    let plan = QueryCompiler::global(CompileOptions::default())
        .compile(&params.validate().unwrap().query)
        .unwrap();
    let conn = fixture.connection();
    let mut stmt = conn.prepare(&plan.sql()).unwrap();
    let mut cursor = SqliteCursor::new(stmt.query([]).unwrap(), &plan.columns);
    let mut rows = Vec::new();
    while let Some(row) = cursor.next_row().unwrap() {
        rows.push(row);
    }

    let response = fixture.service().export(&params).await.unwrap();
    assert_eq!(response.content_type, "application/geo+json");
    assert_eq!(response.file_name, "odapi_data.geojson");
    let body: JsonValue = serde_json::from_slice(&response.into_bytes().await.unwrap()).unwrap();

    assert_eq!(body["type"], "FeatureCollection");
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), rows.len());
    assert_eq!(features.len(), 5);

    let names: Vec<&str> = plan.column_names();
    let (property_names, _geometry) = names.split_at(names.len() - 1);
    for (feature, row) in features.iter().zip(&rows) {
        assert_eq!(feature["type"], "Feature");
        let properties = feature["properties"].as_object().unwrap();
        let keys: Vec<&str> = properties.keys().map(String::as_str).collect();
        assert_eq!(keys, property_names);
        for (name, value) in property_names.iter().zip(row) {
            assert_eq!(properties[*name], value.to_json(), "{name}");
        }
    }
}

#[tokio::test]
async fn test_dates_are_iso_strings() {
    let fixture = sample_database();
    let response = fixture.service().export(&population_params()).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&response.into_bytes().await.unwrap()).unwrap();
    let first = &body["features"][0]["properties"];
    assert_eq!(first["knowledge_date_from"], "2021-01-01");
    assert_eq!(first["knowledge_date_to"], JsonValue::Null);
    assert_eq!(first["period_ref"], "2019-12-31");
}

#[tokio::test]
async fn test_border_geometry_is_polygon() {
    let fixture = sample_database();
    let params = ExportParams {
        geo_value: Some(WINTERTHUR.to_string()),
        geometry_mode: Some("border".into()),
        ..population_params()
    };
    let response = fixture.service().export(&params).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&response.into_bytes().await.unwrap()).unwrap();
    let geometry = &body["features"][0]["geometry"];
    assert_eq!(geometry["type"], "Polygon");
    assert_eq!(geometry["coordinates"][0].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_latest_values_have_null_geometry() {
    let fixture = sample_database();
    let params = ValuesParams {
        geo_code: Some("polg".into()),
        ..Default::default()
    };
    let response = fixture.service().values(&params).await.unwrap();
    let body: JsonValue = serde_json::from_slice(&response.into_bytes().await.unwrap()).unwrap();
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 3);
    assert!(features.iter().all(|f| f["geometry"].is_null()));
}

#[tokio::test]
async fn test_empty_result_is_empty_collection() {
    let fixture = empty_database();
    let response = fixture.service().export(&population_params()).await.unwrap();
    let bytes = response.into_bytes().await.unwrap();
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        r#"{"type":"FeatureCollection","features":[]}"#
    );
}
