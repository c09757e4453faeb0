#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{bulk_facts, sample_database};
use futures::StreamExt;
use odapi::config::{ExportSettings, PoolSettings};
use odapi::engine::{ConnectionPool, EngineError};
use odapi::request::ExportParams;

fn pool_settings(max_connections: usize) -> PoolSettings {
    PoolSettings {
        max_connections,
        acquire_timeout_ms: 100,
    }
}

/// Wait for background tasks to hand their connections back.
async fn settle(pool: &ConnectionPool) {
    for _ in 0..100 {
        if pool.in_use() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} connections still in use", pool.in_use());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_is_bounded() {
    let fixture = sample_database();
    let pool = ConnectionPool::open(&fixture.path, &pool_settings(2)).unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(pool.in_use(), 2);
    assert!(matches!(pool.acquire().await, Err(EngineError::PoolTimeout(_))));

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let conn = pool.acquire().await?;
            conn.query_row("SELECT COUNT(*) FROM mart_ogd_api", [], |r| r.get::<_, i64>(0))
                .map_err(EngineError::from)
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(a);
    assert_eq!(waiter.await.unwrap().unwrap(), 8);
    drop(b);
    settle(&pool).await;
    assert_eq!(pool.idle(), 2);
}

#[tokio::test]
async fn test_closed_pool_rejects_acquire() {
    let fixture = sample_database();
    let pool = ConnectionPool::open(&fixture.path, &pool_settings(1)).unwrap();
    pool.close();
    assert!(matches!(pool.acquire().await, Err(EngineError::PoolClosed)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_completed_export_releases_connection() {
    let fixture = sample_database();
    let service = fixture.service_with(ExportSettings::default(), pool_settings(1));
    let params = ExportParams {
        indicator_id: Some("1".into()),
        geo_code: Some("polg".into()),
        ..Default::default()
    };
    for _ in 0..3 {
        service.export(&params).await.unwrap().into_bytes().await.unwrap();
        settle(service.pool()).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_body_releases_connection() {
    let fixture = sample_database();
    bulk_facts(&fixture, 50_000);
    let export = ExportSettings {
        chunk_size: 1024,
        channel_capacity: 1,
        ..ExportSettings::default()
    };
    let service = fixture.service_with(export, pool_settings(1));
    let params = ExportParams {
        indicator_id: Some("99".into()),
        geo_code: Some("polg".into()),
        format: Some("csv".into()),
        ..Default::default()
    };

    let mut response = service.export(&params).await.unwrap();
    assert!(response.body.next().await.is_some());
    assert_eq!(service.pool().in_use(), 1);
    drop(response);

    settle(service.pool()).await;
    // The single connection is usable again.
    service.export(&params).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_columnar_body_releases_connection() {
    let fixture = sample_database();
    bulk_facts(&fixture, 50_000);
    let export = ExportSettings {
        chunk_size: 1024,
        channel_capacity: 1,
        columnar_batch_size: 256,
        ..ExportSettings::default()
    };
    let service = fixture.service_with(export, pool_settings(1));
    let params = ExportParams {
        indicator_id: Some("99".into()),
        geo_code: Some("polg".into()),
        geometry_mode: Some("point".into()),
        format: Some("binary-columnar".into()),
        ..Default::default()
    };

    let mut response = service.export(&params).await.unwrap();
    // Row groups stream out while the cursor is still open.
    assert!(response.body.next().await.unwrap().is_ok());
    assert!(response.body.next().await.unwrap().is_ok());
    assert_eq!(service.pool().in_use(), 1);
    drop(response);

    settle(service.pool()).await;
    service.export(&params).await.unwrap();
}
