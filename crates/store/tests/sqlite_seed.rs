use blockrun_store::{AppStore, SeedFixture, SqliteStore, StoreError};
use blockrun_types::{AppScope, Visibility};
use tempfile::tempdir;

const FIXTURE: &str = r#"{
    "users": [
        {"username": "alice", "providerId": "gh-1"},
        {"username": "bob", "providerId": "gh-2"}
    ],
    "sessions": [{"token": "tok-alice", "providerId": "gh-1"}],
    "apps": [
        {"sId": "a1", "name": "demo", "owner": "alice", "visibility": "public", "backendProjectId": "12"},
        {"sId": "a2", "name": "secret", "owner": "alice", "backendProjectId": "13", "savedRun": "r-1"}
    ],
    "providers": [
        {"owner": "alice", "providerId": "openai", "config": {"api_key": "sk-1"}},
        {"owner": "alice", "providerId": "serpapi", "config": "{\"key\":\"serp\"}"}
    ]
}"#;

#[tokio::test]
async fn seed_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("nested").join("blockrun.sqlite");

    let store = SqliteStore::open(&db_path).unwrap();
    let report = store.seed(SeedFixture::from_json(FIXTURE).unwrap()).await.unwrap();
    assert_eq!((report.users, report.sessions, report.apps, report.providers), (2, 1, 2, 2));
    drop(store);

    let store = SqliteStore::open(&db_path).unwrap();
    let alice = store.find_user_by_username("alice").await.unwrap().unwrap();

    let public = store.find_app(alice.id, "a1", AppScope::Visible).await.unwrap().unwrap();
    assert_eq!(public.visibility, Visibility::Public);

    let private = store.find_app(alice.id, "a2", AppScope::Owner).await.unwrap().unwrap();
    assert_eq!(private.saved_run.as_deref(), Some("r-1"));

    let providers = store.providers_for_user(alice.id).await.unwrap();
    let ids: Vec<&str> = providers.iter().map(|p| p.provider_id.as_str()).collect();
    assert_eq!(ids, vec!["openai", "serpapi"]);
    assert_eq!(providers[1].config, r#"{"key":"serp"}"#);
}

#[tokio::test]
async fn seed_with_unknown_owner_writes_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    let fixture = SeedFixture::from_json(
        r#"{
            "users": [{"username": "alice", "providerId": "gh-1"}],
            "apps": [{"sId": "a1", "name": "demo", "owner": "carol", "backendProjectId": "12"}]
        }"#,
    )
    .unwrap();

    let err = store.seed(fixture).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownUser(ref name) if name == "carol"));
    assert!(store.find_user_by_username("alice").await.unwrap().is_none());
}
