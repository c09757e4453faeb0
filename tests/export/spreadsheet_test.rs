#[path = "../common/mod.rs"]
mod common;

use common::{bulk_facts, sample_database};
use odapi::config::{ExportSettings, PoolSettings};
use odapi::error::ErrorKind;
use odapi::request::ExportParams;

fn bulk_params(limit: Option<&str>) -> ExportParams {
    ExportParams {
        indicator_id: Some("99".into()),
        geo_code: Some("polg".into()),
        format: Some("spreadsheet".into()),
        limit: limit.map(String::from),
        ..Default::default()
    }
}

fn capped(max_rows: u64) -> ExportSettings {
    ExportSettings {
        spreadsheet_max_rows: max_rows,
        ..ExportSettings::default()
    }
}

#[tokio::test]
async fn test_workbook_is_written() {
    let fixture = sample_database();
    let params = ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        join_geo_meta: true,
        format: Some("xlsx".into()),
        ..Default::default()
    };
    let response = fixture.service().export(&params).await.unwrap();
    assert_eq!(
        response.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    assert_eq!(response.file_name, "odapi_data.xlsx");
    let bytes = response.into_bytes().await.unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn test_row_guard_rejects_before_first_byte() {
    let fixture = sample_database();
    bulk_facts(&fixture, 6);
    let service = fixture.service_with(capped(5), PoolSettings::default());

    match service.export(&bulk_params(None)).await {
        Ok(_) => panic!("expected the row guard to reject the export"),
        Err(e) => {
            assert_eq!(e.kind(), ErrorKind::ResourceLimitExceeded);
            assert_eq!(e.status_code(), 413);
            assert!(e.to_string().contains("6 rows"), "{e}");
        }
    }
    // The connection went back to the pool.
    assert_eq!(service.pool().in_use(), 0);
}

#[tokio::test]
async fn test_exactly_the_cap_is_accepted() {
    let fixture = sample_database();
    bulk_facts(&fixture, 5);
    let service = fixture.service_with(capped(5), PoolSettings::default());
    let bytes = service
        .export(&bulk_params(None))
        .await
        .unwrap()
        .into_bytes()
        .await
        .unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn test_limit_within_cap_is_accepted() {
    let fixture = sample_database();
    bulk_facts(&fixture, 6);
    let service = fixture.service_with(capped(5), PoolSettings::default());
    let response = service.export(&bulk_params(Some("5"))).await.unwrap();
    assert!(!response.into_bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_other_formats_are_not_capped() {
    let fixture = sample_database();
    bulk_facts(&fixture, 6);
    let service = fixture.service_with(capped(5), PoolSettings::default());
    let params = ExportParams {
        format: Some("csv".into()),
        ..bulk_params(None)
    };
    let bytes = service.export(&params).await.unwrap().into_bytes().await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    // Header plus six records.
    assert_eq!(text.lines().count(), 7);
}
