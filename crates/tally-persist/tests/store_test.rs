use serde_json::json;
use std::collections::BTreeMap;
use tally_persist::{map_response, PersistError, UsageRecord, UsageStats, UsageStore};

fn record(id: &str, model: &str, total_tokens: u64) -> UsageRecord {
    UsageRecord {
        usage_id: id.to_string(),
        created: 1748990439,
        model: model.to_string(),
        system_fingerprint: Some("fp_1".to_string()),
        prompt: "Qual a capital do Brasil?".to_string(),
        completion: "Brasília.".to_string(),
        prompt_tokens: total_tokens.saturating_sub(1),
        completion_tokens: 1,
        total_tokens,
        finish_reason: Some("stop".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_example_response_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = UsageStore::open_at(dir.path().join("api_usages.db")).expect("open");

    let raw = json!({
        "id": "x1",
        "created": 1700000000,
        "model": "m",
        "system_fingerprint": null,
        "choices": [{"message": {"content": "hi"}, "finish_reason": "stop", "logprobs": null}],
        "usage": {
            "prompt_tokens": 5,
            "completion_tokens": 2,
            "total_tokens": 7,
            "prompt_tokens_details": {"cached_tokens": 0},
            "prompt_cache_hit_tokens": 0,
            "prompt_cache_miss_tokens": 5
        }
    });

    let record = map_response(&raw, "hello").expect("map");
    assert_eq!(record.completion, "hi");
    assert_eq!(record.total_tokens, 7);
    assert_eq!(record.cached_tokens, 0);

    store.insert(&record).expect("insert");

    let rows = store.fetch_all(None).expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], record.to_row().unwrap());
    assert_eq!(rows[0].usage_id, "x1");
    assert_eq!(rows[0].created_at, "2023-11-14 19:13:20 -0300");
    assert_eq!(rows[0].prompt, "hello");
    assert_eq!(rows[0].system_fingerprint, None);
    assert_eq!(rows[0].logprobs, None);
    assert_eq!(rows[0].cache_miss_tokens, 5);
}

#[test]
fn test_duplicate_insert_keeps_original_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = UsageStore::open_at(dir.path().join("api_usages.db")).expect("open");

    let first = record("dup-1", "deepseek-chat", 28);
    store.insert(&first).expect("first insert");

    let second = UsageRecord {
        model: "deepseek-reasoner".to_string(),
        completion: "Rio de Janeiro.".to_string(),
        total_tokens: 99,
        ..first.clone()
    };
    let err = store.insert(&second).unwrap_err();
    assert!(matches!(err, PersistError::DuplicateKey(ref id) if id == "dup-1"));

    let rows = store.fetch_all(None).expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], first.to_row().unwrap());
}

#[test]
fn test_stats_on_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = UsageStore::open_at(dir.path().join("api_usages.db")).expect("open");

    let stats = store.stats().expect("stats");
    assert_eq!(stats, UsageStats::default());
    assert_eq!(stats.total_requests, 0);
    assert_eq!(stats.total_tokens, 0);
    assert!(stats.models_usage.is_empty());
    assert!(store.fetch_all(None).expect("fetch").is_empty());
}

#[test]
fn test_stats_aggregate_by_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = UsageStore::open_at(dir.path().join("api_usages.db")).expect("open");

    store.insert(&record("r1", "a", 10)).expect("insert r1");
    store.insert(&record("r2", "a", 20)).expect("insert r2");
    store.insert(&record("r3", "b", 5)).expect("insert r3");

    let stats = store.stats().expect("stats");
    assert_eq!(
        stats,
        UsageStats {
            total_requests: 3,
            total_tokens: 35,
            models_usage: BTreeMap::from([("a".to_string(), 2), ("b".to_string(), 1)]),
        }
    );
    assert_eq!(
        serde_json::to_value(&stats).unwrap(),
        json!({"total_requests": 3, "total_tokens": 35, "models_usage": {"a": 2, "b": 1}})
    );
}

#[test]
fn test_open_twice_on_same_file_is_noop() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("api_usages.db");

    let mut store = UsageStore::open_at(&path).expect("open");
    store.insert(&record("keep-me", "m", 3)).expect("insert");
    store.open().expect("second open");
    drop(store);

    let mut reopened = UsageStore::new(&path);
    reopened.open().expect("reopen");
    reopened.open().expect("reopen again");

    let rows = reopened.fetch_all(None).expect("fetch");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].usage_id, "keep-me");

    let conn = rusqlite::Connection::open(&path).expect("raw connection");
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'api_usages' AND name LIKE 'idx_%' ORDER BY name")
        .expect("prepare");
    let indexes: Vec<String> = stmt
        .query_map([], |row| row.get(0))
        .expect("query")
        .collect::<Result<_, _>>()
        .expect("collect");
    assert_eq!(indexes, vec!["idx_created_at", "idx_model"]);
}

#[test]
fn test_open_creates_missing_parent_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("data").join("api_usages.db");

    let store = UsageStore::open_at(&path).expect("open");
    assert!(path.exists());
    assert_eq!(store.path(), path.as_path());
}

#[test]
fn test_logprobs_stored_as_text() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = UsageStore::open_at(dir.path().join("api_usages.db")).expect("open");

    let with_logprobs = UsageRecord {
        logprobs: Some(json!({"content": [{"token": "hi", "logprob": -0.5}]})),
        ..record("lp-1", "m", 2)
    };
    store.insert(&with_logprobs).expect("insert");

    let rows = store.fetch_all(Some(10)).expect("fetch");
    let text = rows[0].logprobs.as_deref().expect("logprobs column");
    let parsed: serde_json::Value = serde_json::from_str(text).expect("valid json");
    assert_eq!(parsed, with_logprobs.logprobs.unwrap());
}
