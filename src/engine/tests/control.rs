use super::*;

#[tokio::test]
async fn cancel_stops_dispatch_and_keeps_applied_effects() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::from_millis(20),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 50).await;
    let mut events = engine.subscribe();

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    engine.cancel(handle.id()).await.unwrap();

    assert_eq!(handle.wait().await, TaskStatus::Aborted);

    let accounts = engine.list_accounts("grpA").await.unwrap();
    let checked = accounts
        .iter()
        .filter(|a| a.status == AccountStatus::Valid)
        .count();
    assert!(checked > 0, "steps before the cancel keep their effect");
    assert!(checked < 50, "cancel should stop dispatch early");
    assert_eq!(
        accounts
            .iter()
            .filter(|a| a.status == AccountStatus::Unchecked)
            .count(),
        50 - checked
    );
    assert!(accounts.iter().all(|a| a.status != AccountStatus::InProgress));

    // Undispatched accounts still count toward progress
    assert_eq!(handle.progress().processed, 50);
    let progress: Vec<u64> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::TaskProgress { id, processed, .. } if id == handle.id() => Some(processed),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&50));
    assert_eq!(progress.len(), checked + 1);

    let entry = &engine.list_history(1, 0).await.unwrap()[0];
    assert_eq!(entry.status, TaskStatus::Aborted);
    assert_eq!(entry.processed, 50);
    assert_eq!(entry.total, 50);
}

#[tokio::test]
async fn cancel_before_first_step_closes_out_every_account() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::from_millis(20),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 10).await;

    let accounts = engine.list_accounts("grpA").await.unwrap();
    let handle = engine.start("grpA", TaskKind::StatusCheck, accounts).await.unwrap();
    handle.cancel();

    assert_eq!(handle.wait().await, TaskStatus::Aborted);
    assert_eq!(handle.progress().processed, 10);
    let entry = &engine.list_history(1, 0).await.unwrap()[0];
    assert_eq!(entry.processed, 10);
}

#[tokio::test]
async fn cancel_through_handle() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::from_millis(20),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 20).await;

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    handle.cancel();
    assert_eq!(handle.wait().await, TaskStatus::Aborted);

    // Cancelling again after the fact is harmless
    handle.cancel();
    assert_eq!(handle.status(), TaskStatus::Aborted);
}

#[tokio::test]
async fn cancel_unknown_task_is_not_found() {
    let (engine, _temp_dir) = create_test_engine().await;
    let result = engine.cancel(crate::types::TaskId(42)).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn progress_events_are_monotonic() {
    let (engine, _temp_dir) = create_test_engine().await;
    seed_group(&engine, "grpA", 5).await;
    let mut events = engine.subscribe();

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    handle.wait().await;

    let progress: Vec<u64> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::TaskProgress { id, processed, total } if id == handle.id() => {
                assert_eq!(total, 5);
                Some(processed)
            }
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn active_tasks_lists_only_running_invocations() {
    let (engine, _temp_dir) = create_test_engine_with(
        Duration::from_millis(20),
        Arc::new(FixedStatusPolicy(AccountStatus::Valid)),
        Arc::new(SequentialAudienceSource::default()),
    )
    .await;
    seed_group(&engine, "grpA", 10).await;

    let handle = engine.start_all("grpA", TaskKind::StatusCheck).await.unwrap();
    let active = engine.active_tasks().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, handle.id());
    assert_eq!(active[0].kind, TaskKind::StatusCheck);
    assert_eq!(active[0].group, "grpA");
    assert_eq!(active[0].progress.total, 10);

    let progress = engine.task_progress(handle.id()).await.unwrap();
    assert!(progress.processed <= progress.total);

    handle.wait().await;
    assert!(engine.active_tasks().await.is_empty());
    assert!(matches!(
        engine.task_progress(handle.id()).await,
        Err(Error::NotFound(_))
    ));
}
