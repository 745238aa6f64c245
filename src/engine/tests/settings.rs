use super::*;
use crate::settings::Settings;

#[tokio::test]
async fn set_setting_persists_to_file() {
    let (engine, temp_dir) = create_test_engine().await;

    engine.set_setting("proxy", "socks5://127.0.0.1:1080").await.unwrap();
    engine.set_setting("theme", "dark").await.unwrap();

    assert_eq!(
        engine.get_setting("proxy").await.as_deref(),
        Some("socks5://127.0.0.1:1080")
    );

    let on_disk = Settings::load(&temp_dir.path().join("settings.txt"))
        .await
        .unwrap();
    assert_eq!(on_disk, engine.settings().await);
    assert_eq!(on_disk.get("theme"), Some("dark"));
}

#[tokio::test]
async fn update_settings_replaces_everything() {
    let (engine, temp_dir) = create_test_engine().await;
    engine.set_setting("theme", "dark").await.unwrap();

    let mut replacement = Settings::default();
    replacement.set("spintax", "{Hi|Hello} there").unwrap();
    engine.update_settings(replacement.clone()).await.unwrap();

    assert_eq!(engine.settings().await, replacement);
    assert_eq!(engine.get_setting("theme").await, None);

    let on_disk = Settings::load(&temp_dir.path().join("settings.txt"))
        .await
        .unwrap();
    assert_eq!(on_disk, replacement);
}

#[tokio::test]
async fn settings_survive_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path(), Duration::ZERO);

    let engine = TaskEngine::new(config.clone()).await.unwrap();
    engine.set_setting("proxy", "http://proxy:8080").await.unwrap();
    engine.shutdown().await.unwrap();
    drop(engine);

    let engine = TaskEngine::new(config).await.unwrap();
    assert_eq!(
        engine.get_setting("proxy").await.as_deref(),
        Some("http://proxy:8080")
    );
}

#[tokio::test]
async fn multi_line_value_is_rejected_and_file_stays_loadable() {
    let (engine, temp_dir) = create_test_engine().await;
    engine.set_setting("proxy", "http://proxy:8080").await.unwrap();

    let result = engine
        .set_setting("spintax", "{Hi|Hello}\nproxy=http://other:9090")
        .await;
    assert!(matches!(result, Err(Error::Config { .. })));
    assert_eq!(engine.get_setting("spintax").await, None);

    let on_disk = Settings::load(&temp_dir.path().join("settings.txt"))
        .await
        .unwrap();
    assert_eq!(on_disk.proxy.as_deref(), Some("http://proxy:8080"));
    assert_eq!(on_disk, engine.settings().await);
}
