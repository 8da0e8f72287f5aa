mod helpers;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use helpers::{group, user, FaultyStore};
use rapport::attitude::directory::StaticDirectory;
use rapport::attitude::error::AttitudeError;
use rapport::attitude::manage::{AttitudeService, GroupPatch, UserPatch};
use rapport::attitude::store::DeleteOutcome;
use rapport::attitude::types::{DirectorySnapshot, Partition};
use rapport::retry::RetryPolicy;

fn service(store: Arc<FaultyStore>, retry: RetryPolicy) -> AttitudeService {
    let directory = StaticDirectory::new(DirectorySnapshot::new(
        vec![user(2, "alice", "u2")],
        vec![group(10, "Rustaceans", "group_10")],
    ));
    AttitudeService::new(store, Arc::new(directory), retry)
}

fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn transient_faults_are_retried() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), quick_retry(3));
    store.fail_next(2);

    let record = service
        .update_user("u2", &UserPatch {
            attitude: Some("warm".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(record.attitude, "warm");
    assert_eq!(record.username, "alice");
}

#[tokio::test]
async fn retries_give_up_after_budget() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), quick_retry(2));
    store.fail_writes_for("group_10");

    let err = service
        .update_group("group_10", &GroupPatch {
            attitude: Some("calm".into()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(store.inner.raw("group_10", Partition::GroupInfo).is_none());
}

#[tokio::test]
async fn invalid_input_is_never_retried() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), quick_retry(3));

    let err = service.update_user("", &UserPatch::default()).await.unwrap_err();
    assert!(matches!(err, AttitudeError::InvalidInput(_)));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn group_update_seeds_from_directory() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), RetryPolicy::none());

    let record = service
        .update_group("group_10", &GroupPatch {
            other: Some("mostly memes".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(record.id, 10);
    assert_eq!(record.channel_name, "Rustaceans");
    assert_eq!(record.other, "mostly memes");
}

#[tokio::test]
async fn delete_then_get_reports_absence() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), RetryPolicy::none());
    service.update_user("u2", &UserPatch::default()).await.unwrap();

    assert_eq!(service.delete_user("u2").await.unwrap(), DeleteOutcome::Deleted);
    assert!(service.get_user("u2").await.unwrap().is_none());
    assert_eq!(service.delete_user("u2").await.unwrap(), DeleteOutcome::NotFound);
}

#[tokio::test]
async fn delete_fault_is_distinct_from_not_found() {
    let store = Arc::new(FaultyStore::new());
    let service = service(Arc::clone(&store), RetryPolicy::none());
    store.fail_writes_for("u2");

    let err = service.delete_user("u2").await.unwrap_err();
    assert!(matches!(err, AttitudeError::Store(_)));
}
