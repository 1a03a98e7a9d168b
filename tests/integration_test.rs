//! Integration tests for sun-cache
//!
//! These tests drive both services end to end over the in-memory store and
//! check what ends up in the shared cache.

mod common;

use common::{date, fixture, ts};
use sun_cache::backend::CacheBackend;
use sun_cache::model::{LocationDto, SunriseSunsetDto};
use sun_cache::repository::{LocationRepository, SunriseSunsetRepository};
use sun_cache::Error;
use std::sync::Arc;

/// Test 1: Create Then Read
///
/// Verifies:
/// - create returns an id and an empty relation list
/// - `Location_<id>` is cached, `Location_All` is not
/// - getById is served without a repository call
#[tokio::test]
async fn test_create_then_get_by_id_skips_repository() {
    let f = fixture();

    let paris = f
        .services
        .locations
        .create(LocationDto::new("Paris", "France"))
        .await
        .expect("create should succeed");

    let id = paris.id.expect("id should be assigned");
    assert!(paris.sunrise_sunset_ids.is_empty());
    assert!(f.backend.exists(&format!("Location_{}", id)).await.unwrap());
    assert!(!f.backend.exists("Location_All").await.unwrap());

    let reads = f.store.read_count();
    let fetched = f.services.locations.get_by_id(id).await.unwrap();

    assert_eq!(fetched, paris);
    assert_eq!(f.store.read_count(), reads, "getById should hit the cache");
}

/// Test 2: Update Invalidates Aggregate
///
/// Verifies:
/// - getById reflects the update
/// - `Location_All` no longer returns the pre-update list
#[tokio::test]
async fn test_update_reflected_in_single_and_aggregate() {
    let f = fixture();
    let locations = &f.services.locations;

    let created = locations
        .create(LocationDto::new("Pariss", "France"))
        .await
        .unwrap();
    let id = created.id.unwrap();
    let before = locations.get_all().await.unwrap();
    assert_eq!(before[0].name, "Pariss");

    let updated = locations
        .update(id, LocationDto::new("Paris", "France"))
        .await
        .unwrap();

    assert_eq!(locations.get_by_id(id).await.unwrap(), updated);
    let after = locations.get_all().await.unwrap();
    assert_eq!(after, vec![updated]);
}

/// Test 3: Delete Removes Both Keys
///
/// Verifies:
/// - single and aggregate keys are gone
/// - a subsequent getById consults the repository and fails with NotFound
#[tokio::test]
async fn test_delete_then_get_consults_repository() {
    let f = fixture();
    let records = &f.services.sunrise_sunsets;

    let created = records
        .create(SunriseSunsetDto::new(date("2023-01-01"), 10.0, 20.0))
        .await
        .unwrap();
    let id = created.id.unwrap();
    records.get_all().await.unwrap();
    assert!(f.backend.exists("SunriseSunset_All").await.unwrap());

    records.delete(id).await.unwrap();

    assert!(!f.backend.exists(&format!("SunriseSunset_{}", id)).await.unwrap());
    assert!(!f.backend.exists("SunriseSunset_All").await.unwrap());

    let reads = f.store.read_count();
    let err = records.get_by_id(id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "SunriseSunset", .. }));
    assert_eq!(f.store.read_count(), reads + 1);
}

/// Test 4: Aggregate Read Is Cached
///
/// Verifies getAll twice with no intervening write returns identical lists
/// with one repository call.
#[tokio::test]
async fn test_get_all_twice_single_repository_call() {
    let f = fixture();
    f.services
        .locations
        .bulk_create(vec![
            LocationDto::new("Paris", "France"),
            LocationDto::new("Oslo", "Norway"),
        ])
        .await
        .unwrap();

    let reads = f.store.read_count();
    let first = f.services.locations.get_all().await.unwrap();
    let second = f.services.locations.get_all().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(f.store.read_count(), reads + 1);
}

/// Test 5: Sun Times Come From Upstream
///
/// Verifies the persisted record carries the looked-up timestamps and the
/// DTO is cached under its id key.
#[tokio::test]
async fn test_create_sunrise_sunset_uses_lookup() {
    let f = fixture();

    let created = f
        .services
        .sunrise_sunsets
        .create(SunriseSunsetDto::new(date("2023-01-01"), 55.7558, 37.6173))
        .await
        .unwrap();
    let id = created.id.unwrap();

    let persisted = SunriseSunsetRepository::find_by_id(&*f.store, id)
        .await
        .unwrap()
        .expect("record should be persisted");
    assert_eq!(persisted.sunrise, Some(ts("2023-01-01T08:00:00+00:00")));
    assert_eq!(persisted.sunset, Some(ts("2023-01-01T16:00:00+00:00")));
    assert_eq!(created.sunrise, persisted.sunrise);
    assert_eq!(f.sun.calls(), 1);
    assert!(f.backend.exists(&format!("SunriseSunset_{}", id)).await.unwrap());
}

/// Test 6: Lookup Failure Aborts The Write
#[tokio::test]
async fn test_lookup_failure_leaves_store_untouched() {
    let f = fixture();
    f.sun.set_failing(true);

    let err = f
        .services
        .sunrise_sunsets
        .create(SunriseSunsetDto::new(date("2023-01-01"), 55.7558, 37.6173))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable(_)));
    assert_eq!(f.store.write_count(), 0);
    assert!(SunriseSunsetRepository::find_all(&*f.store)
        .await
        .unwrap()
        .is_empty());
    assert!(f.backend.is_empty());
}

/// Test 7: Derived Query Is Cached
///
/// Verifies getByDateAndLocationName twice issues one repository query.
#[tokio::test]
async fn test_date_and_location_query_cached() {
    let f = fixture();
    let city = f
        .services
        .locations
        .create(LocationDto::new("TestCity", "Testland"))
        .await
        .unwrap();
    f.services
        .sunrise_sunsets
        .create(
            SunriseSunsetDto::new(date("2023-01-01"), 1.0, 2.0)
                .with_location_ids(vec![city.id.unwrap()]),
        )
        .await
        .unwrap();

    let reads = f.store.read_count();
    let first = f
        .services
        .sunrise_sunsets
        .get_by_date_and_location_name("2023-01-01", "TestCity")
        .await
        .unwrap();
    let second = f
        .services
        .sunrise_sunsets
        .get_by_date_and_location_name("2023-01-01", "TestCity")
        .await
        .unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
    assert_eq!(f.store.read_count(), reads + 1);
}

/// Test 8: Bulk Delete Detaches Reverse Relations
///
/// Verifies:
/// - related records lose their back-references
/// - both single keys and the aggregate key are absent afterwards
#[tokio::test]
async fn test_bulk_delete_detaches_then_deletes() {
    let f = fixture();
    let record = f
        .services
        .sunrise_sunsets
        .create(SunriseSunsetDto::new(date("2023-01-01"), 1.0, 2.0))
        .await
        .unwrap();
    let ss_id = record.id.unwrap();

    f.services
        .locations
        .bulk_create(vec![
            LocationDto::new("A", "X").with_sunrise_sunset_ids(vec![ss_id]),
            LocationDto::new("B", "X").with_sunrise_sunset_ids(vec![ss_id]),
        ])
        .await
        .unwrap();
    let linked = f.services.sunrise_sunsets.get_by_id(ss_id).await.unwrap();
    assert_eq!(linked.location_ids, vec![1, 2]);
    f.services.locations.get_all().await.unwrap();

    f.services.locations.bulk_delete(&[1, 2]).await.unwrap();

    assert!(!f.backend.exists("Location_1").await.unwrap());
    assert!(!f.backend.exists("Location_2").await.unwrap());
    assert!(!f.backend.exists("Location_All").await.unwrap());
    assert!(!LocationRepository::exists_by_id(&*f.store, 1).await.unwrap());

    let detached = f.services.sunrise_sunsets.get_by_id(ss_id).await.unwrap();
    assert!(detached.location_ids.is_empty());
}

/// Test 9: Cross-Entity Staleness
///
/// A location write must not leave the related record's cached DTO pointing
/// at the old relation set.
#[tokio::test]
async fn test_location_write_refreshes_related_record() {
    let f = fixture();
    let record = f
        .services
        .sunrise_sunsets
        .create(SunriseSunsetDto::new(date("2023-03-20"), 1.0, 2.0))
        .await
        .unwrap();
    let ss_id = record.id.unwrap();
    assert!(f
        .services
        .sunrise_sunsets
        .get_by_id(ss_id)
        .await
        .unwrap()
        .location_ids
        .is_empty());

    let oslo = f
        .services
        .locations
        .create(LocationDto::new("Oslo", "Norway").with_sunrise_sunset_ids(vec![ss_id]))
        .await
        .unwrap();

    let refreshed = f.services.sunrise_sunsets.get_by_id(ss_id).await.unwrap();
    assert_eq!(refreshed.location_ids, vec![oslo.id.unwrap()]);

    let by_location = f
        .services
        .sunrise_sunsets
        .get_by_location_id(oslo.id.unwrap())
        .await
        .unwrap();
    assert_eq!(by_location, vec![refreshed]);
}

/// Test 10: Renaming A Location Invalidates Name Queries
#[tokio::test]
async fn test_location_rename_invalidates_date_query() {
    let f = fixture();
    let city = f
        .services
        .locations
        .create(LocationDto::new("Old", "X"))
        .await
        .unwrap();
    let city_id = city.id.unwrap();
    f.services
        .sunrise_sunsets
        .create(SunriseSunsetDto::new(date("2023-01-01"), 1.0, 2.0).with_location_ids(vec![city_id]))
        .await
        .unwrap();

    let renamed_before = f
        .services
        .sunrise_sunsets
        .get_by_date_and_location_name("2023-01-01", "New")
        .await
        .unwrap();
    assert!(renamed_before.is_empty());

    f.services
        .locations
        .update(city_id, LocationDto::new("New", "X").with_sunrise_sunset_ids(vec![1]))
        .await
        .unwrap();

    let renamed_after = f
        .services
        .sunrise_sunsets
        .get_by_date_and_location_name("2023-01-01", "New")
        .await
        .unwrap();
    assert_eq!(renamed_after.len(), 1);
}

/// Test 11: Shared Request Counter
#[tokio::test]
async fn test_counter_shared_by_both_services() {
    let f = fixture();

    f.services
        .locations
        .create(LocationDto::new("Paris", "France"))
        .await
        .unwrap();
    f.services.sunrise_sunsets.get_all().await.unwrap();
    let _ = f.services.sunrise_sunsets.get_by_id(99).await;

    let counter = f.services.counter();
    assert_eq!(counter.value(), 3);

    counter.reset();
    f.services.sunrise_sunsets.get_all().await.unwrap();
    assert_eq!(counter.value(), 1);
}

/// Test 12: Corrupted Entry Recovery
///
/// Verifies a garbage entry is evicted and recomputed from the repository.
#[tokio::test]
async fn test_corrupted_entry_recomputed() {
    let f = fixture();
    let created = f
        .services
        .locations
        .create(LocationDto::new("Paris", "France"))
        .await
        .unwrap();
    let key = format!("Location_{}", created.id.unwrap());

    f.backend
        .set(&key, b"\x00\x01garbage".to_vec())
        .await
        .unwrap();

    let reads = f.store.read_count();
    let fetched = f
        .services
        .locations
        .get_by_id(created.id.unwrap())
        .await
        .unwrap();

    assert_eq!(fetched, created);
    assert_eq!(f.store.read_count(), reads + 1);
    assert_eq!(f.metrics.snapshot().errors, 1);

    // Recomputed entry is readable again
    let reads = f.store.read_count();
    f.services
        .locations
        .get_by_id(created.id.unwrap())
        .await
        .unwrap();
    assert_eq!(f.store.read_count(), reads);
}

/// Test 13: Kind Mismatch Never Yields A Value
#[tokio::test]
async fn test_wrong_kind_under_entity_key() {
    let f = fixture();
    let created = f
        .services
        .locations
        .create(LocationDto::new("Paris", "France"))
        .await
        .unwrap();
    let id = created.id.unwrap();

    // A record list written where a single location is expected
    let bogus = vec![SunriseSunsetDto::new(date("2023-01-01"), 0.0, 0.0)];
    f.services
        .locations
        .cache()
        .put_list(&format!("Location_{}", id), &bogus)
        .await
        .unwrap();

    let fetched = f.services.locations.get_by_id(id).await.unwrap();
    assert_eq!(fetched, created);
}

/// Test 14: Not Found Everywhere
#[tokio::test]
async fn test_not_found_is_uniform() {
    let f = fixture();

    for err in [
        f.services.locations.get_by_id(1).await.unwrap_err(),
        f.services
            .locations
            .update(1, LocationDto::new("A", "B"))
            .await
            .unwrap_err(),
        f.services.locations.delete(1).await.unwrap_err(),
        f.services.sunrise_sunsets.get_by_id(1).await.unwrap_err(),
        f.services
            .sunrise_sunsets
            .update(1, SunriseSunsetDto::new(date("2023-01-01"), 0.0, 0.0))
            .await
            .unwrap_err(),
        f.services.sunrise_sunsets.delete(1).await.unwrap_err(),
    ] {
        assert!(matches!(err, Error::NotFound { id: 1, .. }), "got {:?}", err);
    }
}

/// Test 15: Concurrent Reads
///
/// Verifies parallel readers on a shared service bundle all see the same
/// data and the counter loses no increments.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads() {
    let f = fixture();
    f.services
        .locations
        .bulk_create(vec![
            LocationDto::new("Paris", "France"),
            LocationDto::new("Oslo", "Norway"),
        ])
        .await
        .unwrap();

    let services = Arc::new(f.services);
    let mut handles = vec![];

    for i in 0..16 {
        let services = Arc::clone(&services);
        handles.push(tokio::spawn(async move {
            let id = 1 + (i % 2);
            let one = services.locations.get_by_id(id).await?;
            let all = services.locations.get_all().await?;
            Ok::<_, Error>((one, all))
        }));
    }

    for handle in handles {
        let (one, all) = handle.await.expect("Task failed").expect("Read failed");
        assert_eq!(all.len(), 2);
        assert!(all.contains(&one));
    }

    assert_eq!(services.counter().value(), 1 + 16 * 2);
}
