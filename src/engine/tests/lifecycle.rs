use super::*;

#[tokio::test]
async fn shutdown_cancels_active_tasks_and_rejects_new_ones() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::from_millis(20),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 50).await;
    let mut events = engine.subscribe();

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    engine.shutdown().await.unwrap();

    assert_eq!(handle.status(), TaskStatus::Aborted);
    assert!(engine.active_tasks().await.is_empty());

    let result = engine.start_all("grpA", TaskKind::StatusCheck).await;
    assert!(matches!(result, Err(Error::ShuttingDown)));

    assert!(
        drain(&mut events)
            .iter()
            .any(|e| matches!(e, Event::Shutdown))
    );
}

#[tokio::test]
async fn clean_shutdown_is_remembered_across_restarts() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path(), Duration::ZERO);

    let engine = TaskEngine::new(config.clone()).await.unwrap();
    assert!(!engine.was_unclean_shutdown());
    engine.shutdown().await.unwrap();
    drop(engine);

    let engine = TaskEngine::new(config.clone()).await.unwrap();
    assert!(!engine.was_unclean_shutdown());
    // No shutdown this time
    drop(engine);

    let engine = TaskEngine::new(config).await.unwrap();
    assert!(engine.was_unclean_shutdown());
}

#[tokio::test]
async fn restart_restores_accounts_left_in_progress() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path(), Duration::ZERO);

    let engine = TaskEngine::new(config.clone()).await.unwrap();
    seed_group(&engine, "grpA", 2).await;
    let accounts = engine.list_accounts("grpA").await.unwrap();
    engine
        .update_account_status("grpA", accounts[0].id, AccountStatus::Valid)
        .await
        .unwrap();

    // Simulate a crash mid-step: claims taken, never released
    let group = crate::types::GroupName::parse("grpA").unwrap();
    engine.db.try_claim_account(&group, accounts[0].id).await.unwrap();
    engine.db.try_claim_account(&group, accounts[1].id).await.unwrap();
    drop(engine);

    let engine = TaskEngine::new(config).await.unwrap();
    assert!(engine.was_unclean_shutdown());

    let after = engine.list_accounts("grpA").await.unwrap();
    assert_eq!(after[0].status, AccountStatus::Valid);
    assert_eq!(after[1].status, AccountStatus::Unchecked);
}

#[tokio::test]
async fn reconcile_can_be_disabled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path(), Duration::ZERO);

    let engine = TaskEngine::new(config.clone()).await.unwrap();
    seed_group(&engine, "grpA", 1).await;
    let id = engine.list_accounts("grpA").await.unwrap()[0].id;
    let group = crate::types::GroupName::parse("grpA").unwrap();
    engine.db.try_claim_account(&group, id).await.unwrap();
    drop(engine);

    config.tasks.reconcile_on_startup = false;
    let engine = TaskEngine::new(config).await.unwrap();
    let account = engine.get_account("grpA", id).await.unwrap();
    assert_eq!(account.status, AccountStatus::InProgress);
}

#[tokio::test]
async fn storage_fault_fails_the_invocation() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::ZERO,
        Arc::new(StoreDownPolicy),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 3).await;

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    let status = handle.wait().await;
    match &status {
        TaskStatus::Failed(reason) => assert!(reason.contains("status store unreachable")),
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(handle.progress().processed, 0);

    // The failed step released its claim
    for account in engine.list_accounts("grpA").await.unwrap() {
        assert_eq!(account.status, AccountStatus::Unchecked);
    }

    let entry = &engine.list_history(1, 0).await.unwrap()[0];
    assert_eq!(entry.status, status);
    assert_eq!(entry.processed, 0);
    assert_eq!(entry.total, 3);
}

#[tokio::test]
async fn locked_store_fails_the_invocation() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path(), Duration::ZERO);
    config.persistence.busy_timeout = Duration::from_millis(50);
    let engine = TaskEngine::with_policies(
        config.clone(),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await
    .unwrap();
    seed_group(&engine, "grpA", 5).await;

    // Another writer holds the lock for the whole run
    let holder = crate::db::Database::new(config.database_path()).await.unwrap();
    let lock = holder.begin_immediate().await.unwrap();

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    let status = handle.wait().await;
    assert!(matches!(status, TaskStatus::Failed(_)), "{:?}", status);
    assert_eq!(handle.progress().processed, 0);

    lock.rollback().await.unwrap();

    for account in engine.list_accounts("grpA").await.unwrap() {
        assert_eq!(account.status, AccountStatus::Unchecked);
    }
}
