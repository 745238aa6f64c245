use super::db_with_group;
use crate::db::*;

/// Queries after the pool is closed must fail as storage faults, not hang or panic.
#[tokio::test]
async fn test_list_accounts_after_pool_close_is_storage_fault() {
    let (_temp_file, db, group) = db_with_group("grpA").await;
    db.insert_account(&group, &NewAccount::new("alice", "pw"))
        .await
        .unwrap();

    db.pool().close().await;

    let result = db.list_accounts(&group).await;
    let err = result.unwrap_err();
    assert!(err.is_storage_fault(), "expected storage fault, got {err:?}");
}

#[tokio::test]
async fn test_claim_after_pool_close_is_storage_fault() {
    let (_temp_file, db, group) = db_with_group("grpA").await;
    let id = db
        .insert_account(&group, &NewAccount::new("alice", "pw"))
        .await
        .unwrap();

    db.pool().close().await;

    let err = db.try_claim_account(&group, id).await.unwrap_err();
    assert!(err.is_storage_fault(), "expected storage fault, got {err:?}");
    let err = db
        .bump_message_counters(&group, id, 1)
        .await
        .unwrap_err();
    assert!(err.is_storage_fault(), "expected storage fault, got {err:?}");
}

#[tokio::test]
async fn test_allocation_after_pool_close_is_storage_fault() {
    let (_temp_file, db, group) = db_with_group("grpA").await;
    db.add_identifier(&group, "111").await.unwrap();

    db.pool().close().await;

    let err = db.claim_unused_identifier(&group).await.unwrap_err();
    assert!(err.is_storage_fault(), "expected storage fault, got {err:?}");
}

#[tokio::test]
async fn test_create_group_after_pool_close_returns_error() {
    let (_temp_file, db, _group) = db_with_group("grpA").await;

    db.pool().close().await;

    let other = crate::types::GroupName::parse("grpB").unwrap();
    let result = db.create_group(&other).await;
    assert!(
        result.is_err(),
        "create_group after pool close should return an error, got: {:?}",
        result
    );
}
