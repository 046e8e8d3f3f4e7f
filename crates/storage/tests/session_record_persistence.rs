use storage::{KeyValueStore, Storage};

#[tokio::test]
async fn record_survives_reopening_the_database() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let db_path = std::env::temp_dir().join(format!("eventmap_reopen_{suffix}.sqlite3"));
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let first = Storage::new(&database_url).await.expect("first open");
    first
        .set("user", r#"{"email":"ada@example.com"}"#)
        .await
        .expect("write");
    first.pool().close().await;

    let second = Storage::new(&database_url).await.expect("second open");
    let value = second.get("user").await.expect("read");
    assert_eq!(value.as_deref(), Some(r#"{"email":"ada@example.com"}"#));

    second.remove("user").await.expect("remove");
    assert!(second.get("user").await.expect("read").is_none());
    second.pool().close().await;

    let _ = std::fs::remove_file(&db_path);
}
