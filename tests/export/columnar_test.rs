#[path = "../common/mod.rs"]
mod common;

use arrow_array::{Array, BinaryArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow_schema::DataType;
use bytes::Bytes;
use common::{bulk_facts, sample_database};
use odapi::config::{ExportSettings, PoolSettings};
use odapi::geo::Geometry;
use odapi::request::ExportParams;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

fn params() -> ExportParams {
    ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        join_geo_meta: true,
        geometry_mode: Some("point".into()),
        format: Some("binary-columnar".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_parquet_read_back() {
    let fixture = sample_database();
    let response = fixture.service().export(&params()).await.unwrap();
    assert_eq!(response.content_type, "application/octet-stream");
    assert_eq!(response.file_name, "odapi_data.parquet");
    let bytes = Bytes::from(response.into_bytes().await.unwrap());

    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).unwrap();
    let schema = builder.schema().clone();
    assert_eq!(schema.field_with_name("geo_value").unwrap().data_type(), &DataType::Int64);
    assert_eq!(schema.field_with_name("period_ref").unwrap().data_type(), &DataType::Date32);
    assert_eq!(
        schema.field_with_name("indicator_value_numeric").unwrap().data_type(),
        &DataType::Float64
    );
    assert_eq!(schema.fields().last().unwrap().name(), "geometry");
    assert_eq!(schema.fields().last().unwrap().data_type(), &DataType::Binary);

    let geo = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kv| kv.iter().find(|e| e.key == "geo"))
        .and_then(|e| e.value.clone())
        .unwrap();
    let geo: serde_json::Value = serde_json::from_str(&geo).unwrap();
    assert_eq!(geo["primary_column"], "geometry");
    assert_eq!(geo["columns"]["geometry"]["encoding"], "WKB");

    let batches: Vec<_> = builder.build().unwrap().map(Result::unwrap).collect();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 3);

    let batch = &batches[0];
    let index = |name: &str| schema.index_of(name).unwrap();
    let geo_value = batch
        .column(index("geo_value"))
        .as_any()
        .downcast_ref::<Int64Array>()
        .unwrap();
    assert_eq!(geo_value.value(0), 230);
    let values = batch
        .column(index("indicator_value_numeric"))
        .as_any()
        .downcast_ref::<Float64Array>()
        .unwrap();
    assert_eq!(values.value(0), 111_851.0);
    let names = batch
        .column(index("geo_name"))
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(names.value(0), "Winterthur");
    let periods = batch
        .column(index("period_ref"))
        .as_any()
        .downcast_ref::<Date32Array>()
        .unwrap();
    // 2019-12-31
    assert_eq!(periods.value(0), 18_261);
    let knowledge_to = batch.column(index("knowledge_date_to"));
    assert!(knowledge_to.is_null(0));

    let geometry = batch
        .column(index("geometry"))
        .as_any()
        .downcast_ref::<BinaryArray>()
        .unwrap();
    assert!(matches!(
        Geometry::from_wkb(geometry.value(0)).unwrap(),
        Geometry::Point(Some(_))
    ));
}

#[tokio::test]
async fn test_rows_span_several_batches() {
    let fixture = sample_database();
    bulk_facts(&fixture, 25);
    let export = ExportSettings {
        columnar_batch_size: 10,
        ..ExportSettings::default()
    };
    let service = fixture.service_with(export, PoolSettings::default());
    let params = ExportParams {
        indicator_id: Some("99".into()),
        ..params()
    };
    let bytes = Bytes::from(service.export(&params).await.unwrap().into_bytes().await.unwrap());

    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes).unwrap();
    assert_eq!(builder.metadata().file_metadata().num_rows(), 25);
    // One row group per batch: 10 + 10 + 5.
    let sizes: Vec<i64> = builder
        .metadata()
        .row_groups()
        .iter()
        .map(|rg| rg.num_rows())
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    let total: usize = builder
        .build()
        .unwrap()
        .map(|b| b.unwrap().num_rows())
        .sum();
    assert_eq!(total, 25);
}
