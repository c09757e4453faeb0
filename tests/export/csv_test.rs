#[path = "../common/mod.rs"]
mod common;

use common::{sample_database, WINTERTHUR};
use odapi::request::{ExportParams, SnapshotParams};

#[tokio::test]
async fn test_csv_records() {
    let fixture = sample_database();
    let params = ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        geo_value: Some(WINTERTHUR.to_string()),
        geometry_mode: Some("point".into()),
        format: Some("csv".into()),
        ..Default::default()
    };
    let response = fixture.service().export(&params).await.unwrap();
    assert_eq!(response.content_type, "text/csv");
    let bytes = response.into_bytes().await.unwrap();

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("indicator_id"));
    assert_eq!(headers.iter().last(), Some("geometry"));

    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 2);
    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    assert_eq!(&records[0][column("period_ref")], "2019-12-31");
    assert_eq!(&records[0][column("knowledge_date_to")], "");
    assert_eq!(&records[1][column("source")], "BFS STATPOP");
    assert!(records[0][column("geometry")].starts_with("POINT ("));
}

#[tokio::test]
async fn test_snapshot_csv_uses_wkt_polygons() {
    let fixture = sample_database();
    let params = SnapshotParams {
        geo_code: Some("polg".into()),
        year: Some("2020".into()),
        geometry_mode: Some("border_simplified_50m".into()),
        format: Some("csv".into()),
        ..Default::default()
    };
    let bytes = fixture
        .service()
        .snapshot(&params)
        .await
        .unwrap()
        .into_bytes()
        .await
        .unwrap();

    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][1], "230");
    assert_eq!(&records[1][3], "Bern");
    assert!(records.iter().all(|r| r[6].starts_with("POLYGON ((")));
}
