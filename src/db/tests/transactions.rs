use super::db_with_group;
use crate::db::{Database, NewAccount};
use crate::error::Error;
use crate::types::GroupName;
use std::time::Duration;

#[tokio::test]
async fn test_abandoned_bulk_insert_releases_write_lock() {
    let (temp_file, db, group) = db_with_group("grpA").await;
    let values: Vec<String> = (0..50_000).map(|n| format!("id-{}", n)).collect();

    // Caller gives up while the insert is still running
    let outcome = tokio::time::timeout(
        Duration::from_millis(5),
        db.add_identifiers(&group, &values),
    )
    .await;

    // A second handle on the same file can still write
    let other = Database::new(temp_file.path()).await.unwrap();
    assert!(other.add_identifier(&group, "after").await.unwrap());

    // Both or neither: the batch is either fully committed or fully gone
    let total = other.pool_stats(&group).await.unwrap().total;
    match outcome {
        Ok(added) => {
            assert_eq!(added.unwrap(), 50_000);
            assert_eq!(total, 50_001);
        }
        Err(_) => assert_eq!(total, 1),
    }

    // The original pool is not wedged either
    for n in 0..4 {
        assert!(
            db.add_identifier(&group, &format!("later-{}", n))
                .await
                .unwrap()
        );
    }
    assert_eq!(other.pool_stats(&group).await.unwrap().total, total + 4);

    other.close().await;
    db.close().await;
}

#[tokio::test]
async fn test_failed_bulk_insert_leaves_nothing_behind() {
    let (_temp_file, db, group) = db_with_group("grpA").await;
    db.insert_account(&group, &NewAccount::new("a", "b"))
        .await
        .unwrap();

    // Spans two chunks against a group that does not exist
    let accounts: Vec<NewAccount> = (0..300)
        .map(|n| NewAccount::new(format!("u{}", n), "p"))
        .collect();
    let missing = GroupName::parse("ghost").unwrap();
    let err = db.insert_accounts(&missing, &accounts).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    assert_eq!(db.list_accounts(&group).await.unwrap().len(), 1);
    db.close().await;
}

#[tokio::test]
async fn test_locked_store_is_a_storage_fault() {
    let (temp_file, db, group) = db_with_group("grpA").await;
    let id = db
        .insert_account(&group, &NewAccount::new("alice", "secret"))
        .await
        .unwrap();
    let blocked = Database::connect(temp_file.path(), Duration::from_millis(50))
        .await
        .unwrap();

    let lock = db.begin_immediate().await.unwrap();

    let err = blocked.try_claim_account(&group, id).await.unwrap_err();
    assert!(matches!(err, Error::Sqlx(_)), "{:?}", err);
    assert!(err.is_storage_fault());

    let err = blocked.add_identifier(&group, "111").await.unwrap_err();
    assert!(err.is_storage_fault());

    let err = blocked.set_clean_shutdown().await;
    assert!(err.is_err());

    lock.rollback().await.unwrap();

    // Lock gone: the same calls succeed
    blocked.try_claim_account(&group, id).await.unwrap();
    assert!(blocked.add_identifier(&group, "111").await.unwrap());

    blocked.close().await;
    db.close().await;
}

#[tokio::test]
async fn test_missing_group_is_not_a_storage_fault() {
    let (_temp_file, db, _group) = db_with_group("grpA").await;
    let missing = GroupName::parse("ghost").unwrap();

    let err = db.list_accounts(&missing).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(!err.is_storage_fault());

    db.close().await;
}
