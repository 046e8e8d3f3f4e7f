use super::*;

#[tokio::test]
async fn stores_and_reads_values() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("user", r#"{"email":"a@b.c"}"#).await.expect("set");
    let value = storage.get("user").await.expect("get");
    assert_eq!(value.as_deref(), Some(r#"{"email":"a@b.c"}"#));
}

#[tokio::test]
async fn overwrites_existing_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.set("user", "first").await.expect("first");
    storage.set("user", "second").await.expect("second");

    assert_eq!(
        storage.get("user").await.expect("get").as_deref(),
        Some("second")
    );
    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM key_value_entries")
        .fetch_one(storage.pool())
        .await
        .expect("count");
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn removing_missing_key_is_not_an_error() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.remove("user").await.expect("remove missing");
    storage.set("user", "x").await.expect("set");
    storage.remove("user").await.expect("remove");
    storage.remove("user").await.expect("remove again");
    assert!(storage.get("user").await.expect("get").is_none());
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = std::env::temp_dir().join(format!("eventmap_storage_test_{suffix}"));
    let db_path = temp_root.join("nested").join("storage.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.pool().close().await;
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );

    std::fs::remove_dir_all(temp_root).expect("cleanup");
}

#[tokio::test]
async fn json_helpers_round_trip_through_memory_store() {
    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Record {
        email: String,
    }

    let store = MemoryStore::new();
    assert!(load_json::<Record>(&store, "user").await.expect("load").is_none());

    save_json(
        &store,
        "user",
        &Record {
            email: "x@y.z".into(),
        },
    )
    .await
    .expect("save");
    let loaded: Option<Record> = load_json(&store, "user").await.expect("load");
    assert_eq!(loaded.map(|r| r.email).as_deref(), Some("x@y.z"));
    store.remove("user").await.expect("remove");
    assert!(store.get("user").await.expect("get").is_none());
}

#[tokio::test]
async fn load_json_reports_corrupt_values() {
    let store = MemoryStore::new();
    store.set("user", "{not json").await.expect("set");
    let err = load_json::<serde_json::Value>(&store, "user")
        .await
        .expect_err("corrupt");
    assert!(err.to_string().contains("not valid JSON"));
}

#[test]
fn memory_urls_have_no_file_path() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/app.db?mode=rwc"),
        Some(PathBuf::from("./data/app.db"))
    );
}
