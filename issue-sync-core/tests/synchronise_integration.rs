use issue_sync_core::config::{RunMode, SourceRepo, SyncConfig};
use issue_sync_core::contract::{
    MockFetcher, MockIndexUploader, MockRawArchive, MockSnapshotStore, SnapshotStore,
};
use issue_sync_core::error::{ConfigError, SyncError};
use issue_sync_core::normalize::normalize_all;
use issue_sync_core::record::{Fields, RecordId};
use issue_sync_core::snapshot::{FileRawArchive, FileSnapshotStore, Snapshot};
use issue_sync_core::strategy::{LiveStrategy, ReplayStrategy};
use issue_sync_core::synchronise::synchronise;
use serde_json::{json, Value};
use tempfile::tempdir;

fn raw_issue(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "number": id,
        "title": title,
        "state": "open",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "user": {"login": "octocat"},
        "html_url": format!("https://github.com/o/r/issues/{id}"),
        "url": format!("https://api.github.com/repos/o/r/issues/{id}"),
        "comments": 0,
        "reactions": {"total_count": 0},
        "labels": [{"name": "bug"}, {"name": "ui"}]
    })
}

fn source() -> SourceRepo {
    SourceRepo::new("o", "r").with_extra("repo", "r")
}

fn quiet_archive() -> MockRawArchive {
    let mut archive = MockRawArchive::new();
    archive.expect_save().returning(|_, _| Ok(()));
    archive
}

/// Snapshot as a previous run would have stored it for `raws`.
fn snapshot_of(raws: Vec<Value>) -> Snapshot {
    Snapshot::new(normalize_all(raws, &source().extra).unwrap())
}

#[tokio::test]
async fn test_first_live_run_uploads_everything_and_writes_snapshot() {
    let config = SyncConfig::new("unused", vec![source()]);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .withf(|src, max_pages| src.repo == "r" && max_pages.is_none())
        .times(1)
        .returning(|_, _| Ok(vec![raw_issue(1, "one"), raw_issue(2, "two")]));

    let mut uploader = MockIndexUploader::new();
    uploader
        .expect_upload()
        .withf(|batch| {
            batch.len() == 2 && batch.iter().all(|r| r.field("repo") == Some(&json!("r")))
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().returning(|| Ok(Snapshot::default()));
    snapshots
        .expect_save()
        .withf(|snapshot| snapshot.len() == 2)
        .times(1)
        .returning(|_| Ok(()));

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), None);
    let report = synchronise(&config, &snapshots, &strategy)
        .await
        .expect("Synchronise should succeed");

    assert_eq!(report.mode, RunMode::Live);
    assert_eq!(report.new, 2);
    assert_eq!(report.uploaded, 2);
    assert!(report.snapshot_written);
    assert_eq!(report.sources[0].source_name, "r");
    assert_eq!(report.sources[0].fetched, 2);
    assert_eq!(report.sources[0].normalized, 2);
}

#[tokio::test]
async fn test_live_run_uploads_only_changed_records() {
    let config = SyncConfig::new("unused", vec![source()]);
    let previous = snapshot_of(vec![raw_issue(1, "one"), raw_issue(2, "two"), raw_issue(3, "three")]);

    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().returning(|_, _| {
        let mut reordered = raw_issue(1, "one");
        reordered["labels"] = json!([{"name": "ui"}, {"name": "bug"}]);
        Ok(vec![reordered, raw_issue(2, "two, edited"), raw_issue(4, "four")])
    });

    let mut uploader = MockIndexUploader::new();
    uploader
        .expect_upload()
        .withf(|batch| {
            let ids: Vec<&RecordId> = batch.iter().map(|r| &r.id).collect();
            ids == vec![&RecordId::Int(4), &RecordId::Int(2)]
        })
        .times(1)
        .returning(|_| Ok(()));

    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().return_once(move || Ok(previous));
    snapshots
        .expect_save()
        .withf(|snapshot| snapshot.len() == 3)
        .times(1)
        .returning(|_| Ok(()));

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), Some(50));
    let report = synchronise(&config, &snapshots, &strategy).await.unwrap();

    assert_eq!((report.new, report.changed, report.deleted, report.unchanged), (1, 1, 1, 1));
    assert_eq!(report.uploaded, 2);
}

#[tokio::test]
async fn test_unchanged_run_skips_upload_but_rewrites_snapshot() {
    let config = SyncConfig::new("unused", vec![source()]);
    let previous = snapshot_of(vec![raw_issue(1, "one")]);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|_, _| Ok(vec![raw_issue(1, "one")]));

    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().never();

    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().return_once(move || Ok(previous));
    snapshots.expect_save().times(1).returning(|_| Ok(()));

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), None);
    let report = synchronise(&config, &snapshots, &strategy).await.unwrap();

    assert_eq!(report.unchanged, 1);
    assert_eq!(report.uploaded, 0);
    assert!(report.snapshot_written);
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_any_write() {
    let config = SyncConfig::new("unused", vec![source(), SourceRepo::new("o", "other")]);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(1)
        .returning(|_, _| Err("connection refused".into()));

    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().never();
    let mut archive = MockRawArchive::new();
    archive.expect_save().never();
    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().never();
    snapshots.expect_save().never();

    let strategy = LiveStrategy::new(fetcher, uploader, archive, None);
    let err = synchronise(&config, &snapshots, &strategy).await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch { ref source_name, .. } if source_name == "r"));
}

#[tokio::test]
async fn test_upload_failure_leaves_snapshot_untouched() {
    let config = SyncConfig::new("unused", vec![source()]);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|_, _| Ok(vec![raw_issue(1, "one")]));
    let mut uploader = MockIndexUploader::new();
    uploader
        .expect_upload()
        .returning(|_| Err("index unavailable".into()));
    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().returning(|| Ok(Snapshot::default()));
    snapshots.expect_save().never();

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), None);
    let err = synchronise(&config, &snapshots, &strategy).await.unwrap_err();

    assert!(matches!(err, SyncError::Upload(_)));
}

#[tokio::test]
async fn test_missing_required_field_aborts_the_run() {
    let config = SyncConfig::new("unused", vec![source()]);

    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().returning(|_, _| {
        let mut broken = raw_issue(2, "two");
        broken.as_object_mut().unwrap().remove("user");
        Ok(vec![raw_issue(1, "one"), broken])
    });
    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().never();
    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_save().never();

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), None);
    let err = synchronise(&config, &snapshots, &strategy).await.unwrap_err();

    assert!(matches!(err, SyncError::Normalize { .. }), "got: {err}");
}

#[tokio::test]
async fn test_duplicate_ids_across_sources_are_rejected() {
    let config = SyncConfig::new("unused", vec![source(), SourceRepo::new("o", "fork")]);

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .times(2)
        .returning(|_, _| Ok(vec![raw_issue(1, "one")]));
    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().never();
    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().returning(|| Ok(Snapshot::default()));
    snapshots.expect_save().never();

    let strategy = LiveStrategy::new(fetcher, uploader, quiet_archive(), None);
    let err = synchronise(&config, &snapshots, &strategy).await.unwrap_err();

    assert!(matches!(err, SyncError::ChangeSet(_)));
}

#[tokio::test]
async fn test_live_then_replay_against_files() {
    let dir = tempdir().unwrap();
    let mut config = SyncConfig::new(dir.path(), vec![source()]);
    let snapshots = FileSnapshotStore::new(config.snapshot_path());

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|_, _| Ok(vec![raw_issue(1, "one"), raw_issue(2, "two")]));
    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().times(1).returning(|_| Ok(()));

    let live = LiveStrategy::new(fetcher, uploader, FileRawArchive::new(dir.path()), None);
    synchronise(&config, &snapshots, &live).await.unwrap();
    let written = std::fs::read_to_string(config.snapshot_path()).unwrap();
    assert!(dir.path().join("issues_r.json").exists());

    // Replay the archived response with one field overridden: everything changes,
    // nothing is uploaded and the snapshot stays as it was.
    config.mode = RunMode::Replay;
    config.sources[0].extra = Fields::from([("repo".to_string(), json!("renamed"))]);
    let replay = ReplayStrategy::new(FileRawArchive::new(dir.path()));
    let report = synchronise(&config, &snapshots, &replay).await.unwrap();

    assert_eq!(report.mode, RunMode::Replay);
    assert_eq!(report.changed, 2);
    assert_eq!(report.uploaded, 0);
    assert!(!report.snapshot_written);
    assert_eq!(std::fs::read_to_string(config.snapshot_path()).unwrap(), written);
    assert_eq!(snapshots.load().unwrap().len(), 2);
}

#[tokio::test]
async fn test_replay_without_archive_fails() {
    let dir = tempdir().unwrap();
    let config = SyncConfig::new(dir.path(), vec![source()]);
    let snapshots = FileSnapshotStore::new(config.snapshot_path());

    let replay = ReplayStrategy::new(FileRawArchive::new(dir.path()));
    let err = synchronise(&config, &snapshots, &replay).await.unwrap_err();

    assert!(matches!(err, SyncError::Archive { .. }));
    assert!(!config.snapshot_path().exists());
}

#[tokio::test]
async fn test_sources_sharing_a_name_are_rejected_before_fetching() {
    let config = SyncConfig::new(
        "unused",
        vec![SourceRepo::new("a", "docs"), SourceRepo::new("b", "docs")],
    );

    let mut fetcher = MockFetcher::new();
    fetcher.expect_fetch().never();
    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().never();
    let mut archive = MockRawArchive::new();
    archive.expect_save().never();
    let mut snapshots = MockSnapshotStore::new();
    snapshots.expect_load().never();
    snapshots.expect_save().never();

    let strategy = LiveStrategy::new(fetcher, uploader, archive, None);
    let err = synchronise(&config, &snapshots, &strategy).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Config(ConfigError::DuplicateSourceName { ref name, ref first, ref second })
            if name == "docs" && first == "a/docs" && second == "b/docs"
    ));
}

#[tokio::test]
async fn test_same_repo_name_with_distinct_names_keeps_separate_archives() {
    let dir = tempdir().unwrap();
    let mut first = SourceRepo::new("a", "docs");
    first.name = Some("a-docs".into());
    let second = SourceRepo::new("b", "docs");
    let config = SyncConfig::new(dir.path(), vec![first, second]);
    let snapshots = FileSnapshotStore::new(config.snapshot_path());

    let mut fetcher = MockFetcher::new();
    fetcher
        .expect_fetch()
        .returning(|src, _| Ok(vec![raw_issue(if src.owner == "a" { 1 } else { 2 }, "doc")]));
    let mut uploader = MockIndexUploader::new();
    uploader.expect_upload().returning(|_| Ok(()));
    let live = LiveStrategy::new(fetcher, uploader, FileRawArchive::new(dir.path()), None);
    let report = synchronise(&config, &snapshots, &live).await.unwrap();
    assert_eq!(report.new, 2);

    let replay = ReplayStrategy::new(FileRawArchive::new(dir.path()));
    let report = synchronise(&config, &snapshots, &replay).await.unwrap();
    assert_eq!(report.unchanged, 2);
    assert_eq!(report.new, 0);
}
