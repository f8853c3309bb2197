mod common;

use std::sync::Arc;

use cleaner::model::{CandidateKind, LastVersions, VersionNumber, VersionStatus};
use cleaner::testing::{InMemoryContentStore, RecordingIndex};
use cleaner::{CleanupError, CleanupMode, DeletionEvent, DeletionKind, Phase, PreviewCleaner};
use common::{Harness, add_content_with_previews, config};

fn add_roots(harness: &Harness, prefix: &str, ids: &[i64]) {
    for id in ids {
        harness
            .store
            .add_content(*id - 9, &format!("{prefix}/doc{id}.docx"));
        harness
            .store
            .add_folder(*id, &format!("{prefix}/doc{id}.docx/Previews"));
    }
}

#[tokio::test]
async fn test_all_versions_pages_through_scoped_roots() {
    let harness = Harness::new();
    add_roots(&harness, "/site/docs", &[10, 11, 12, 13]);
    for id in [10, 11, 12, 13] {
        harness.store.add_folder(
            id + 10,
            &format!("/site/docs/doc{id}.docx/Previews/V1.0.A"),
        );
    }
    harness
        .store
        .add_folder(40, "/site/other/x.docx/Previews");

    let mut config = config(CleanupMode::AllVersions, 0);
    config.path = Some("/site/docs/".to_string());
    config.block_size = 2;

    let report = harness.cleaner(config).execute().await.unwrap();

    let folders = report.phase(Phase::DeleteFolders).unwrap();
    assert_eq!(folders.pages, 2);
    assert_eq!(folders.deleted, 4);
    assert_eq!(report.deleted(), 4);
    assert!(report.phase(Phase::DeleteImages).is_none());
    assert_eq!(report.metrics.folders_deleted, 4);

    assert_eq!(harness.store.deleted_ids(), vec![10, 11, 12, 13]);
    assert!(!harness.store.contains(20), "subtree goes with its root");
    assert!(harness.store.contains(40), "outside the scope");

    let loads = harness.store.loads();
    let cursors: Vec<_> = loads
        .iter()
        .filter(|q| q.kind == CandidateKind::PreviewRoots)
        .map(|q| q.min_id)
        .collect();
    assert_eq!(cursors, vec![0, 11, 13]);
    assert!(loads.iter().all(|q| q.page_size == 2));
    assert!(
        loads
            .iter()
            .all(|q| q.path_prefix.as_deref() == Some("/site/docs"))
    );

    let batches = harness.index.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 4);
    let mut removed = harness.index.removed_paths();
    removed.sort();
    assert_eq!(
        removed,
        vec![
            "/site/docs/doc10.docx/Previews",
            "/site/docs/doc11.docx/Previews",
            "/site/docs/doc12.docx/Previews",
            "/site/docs/doc13.docx/Previews",
        ]
    );

    let mut announced = harness.listener.ids(DeletionKind::Folder);
    announced.sort_unstable();
    assert_eq!(announced, vec![10, 11, 12, 13]);
}

fn add_versioned_content(harness: &Harness, tags: &[(i64, &str)]) {
    let store = &harness.store;
    store.add_content(1, "/Root/doc.docx");
    store.add_folder(2, "/Root/doc.docx/Previews");
    for (id, tag) in tags {
        store.add_folder(*id, &format!("/Root/doc.docx/Previews/{tag}"));
        store.add_image(
            id + 10,
            &format!("/Root/doc.docx/Previews/{tag}/preview1.png"),
            1,
        );
    }
    store.set_last_versions(
        "/Root/doc.docx",
        LastVersions {
            major: Some(VersionNumber::new(2, 0, VersionStatus::Approved)),
            minor: Some(VersionNumber::new(1, 1, VersionStatus::Approved)),
        },
    );
}

#[tokio::test]
async fn test_keep_last_versions_keeps_current_and_locked() {
    let harness = Harness::new();
    add_versioned_content(&harness, &[(3, "V1.0.L"), (4, "V1.1"), (5, "V2.0.A")]);

    let report = harness
        .cleaner(config(CleanupMode::KeepLastVersions, 0))
        .execute()
        .await
        .unwrap();

    assert_eq!(report.deleted(), 0);
    // the Previews root is not a version folder
    assert_eq!(report.phase(Phase::DeleteFolders).unwrap().retained, 4);
    assert!(harness.store.deleted_ids().is_empty());
    assert!(harness.index.batches().is_empty());
    assert_eq!(harness.store.version_lookups(), 1);
}

#[tokio::test]
async fn test_keep_last_versions_deletes_outdated_versions() {
    let harness = Harness::new();
    add_versioned_content(
        &harness,
        &[(3, "V1.0.L"), (4, "V1.1.A"), (5, "V2.0.A"), (6, "V1.0.A")],
    );

    let report = harness
        .cleaner(config(CleanupMode::KeepLastVersions, 0))
        .execute()
        .await
        .unwrap();

    assert_eq!(harness.store.deleted_ids(), vec![6]);
    assert!(!harness.store.contains(16));
    assert_eq!(report.phase(Phase::DeleteFolders).unwrap().deleted, 1);
    assert_eq!(
        harness.index.removed_paths(),
        vec!["/Root/doc.docx/Previews/V1.0.A"]
    );
    assert_eq!(
        harness.listener.events(),
        vec![DeletionEvent {
            kind: DeletionKind::Folder,
            node_id: 6
        }]
    );
}

#[tokio::test]
async fn test_version_cache_lives_for_one_run() {
    let harness = Harness::new();
    add_versioned_content(&harness, &[(4, "V1.1.A"), (5, "V2.0.A")]);
    let cleaner = harness.cleaner(config(CleanupMode::KeepLastVersions, 0));

    cleaner.execute().await.unwrap();
    cleaner.execute().await.unwrap();

    assert_eq!(harness.store.version_lookups(), 2);
}

#[tokio::test]
async fn test_image_trimming_keeps_low_indexes() {
    let harness = Harness::new();
    let store = &harness.store;
    store.add_content(1, "/Root/a.docx");
    store.add_folder(2, "/Root/a.docx/Previews");
    store.add_folder(3, "/Root/a.docx/Previews/V1.0.A");
    for index in 1..=4 {
        store.add_image(
            3 + index as i64,
            &format!("/Root/a.docx/Previews/V1.0.A/preview{index}.png"),
            index,
        );
    }

    let report = harness
        .cleaner(config(CleanupMode::AllVersions, 2))
        .execute()
        .await
        .unwrap();

    assert_eq!(store.deleted_ids(), vec![6, 7]);
    assert!(report.phase(Phase::DeleteFolders).is_none());
    assert_eq!(report.phase(Phase::DeleteImages).unwrap().deleted, 2);
    assert_eq!(report.metrics.images_deleted, 2);

    let mut images = harness.listener.ids(DeletionKind::Image);
    images.sort_unstable();
    assert_eq!(images, vec![6, 7]);
    assert!(harness.listener.ids(DeletionKind::Folder).is_empty());

    assert!(store.loads().iter().all(|q| matches!(
        q.kind,
        CandidateKind::PreviewImages | CandidateKind::EmptyFolders
    )));
    assert!(
        store
            .loads()
            .iter()
            .filter(|q| q.kind == CandidateKind::PreviewImages)
            .all(|q| q.index_threshold == Some(2))
    );
    assert_eq!(harness.index.removed_paths().len(), 2);
}

#[tokio::test]
async fn test_folders_emptied_by_image_trimming_are_swept() {
    let harness = Harness::new();
    let store = &harness.store;
    store.add_content(1, "/Root/a.docx");
    store.add_folder(2, "/Root/a.docx/Previews");
    store.add_folder(3, "/Root/a.docx/Previews/V1.0.A");
    store.add_image(4, "/Root/a.docx/Previews/V1.0.A/preview3.png", 3);
    store.add_image(5, "/Root/a.docx/Previews/V1.0.A/preview5.png", 5);

    let report = harness
        .cleaner(config(CleanupMode::AllVersions, 2))
        .execute()
        .await
        .unwrap();

    assert_eq!(store.deleted_ids(), vec![3, 4, 5]);
    assert_eq!(report.phase(Phase::DeleteEmptyFolders).unwrap().deleted, 1);
    // lower id than the folder it contained, so not revisited in this run
    assert!(store.contains(2));
}

#[tokio::test]
async fn test_empty_folders_only_skips_folder_and_image_phases() {
    let harness = Harness::new();
    let store = &harness.store;
    store.add_content(1, "/Root/a.docx");
    store.add_folder(2, "/Root/a.docx/Previews");
    store.add_folder(3, "/Root/a.docx/Previews/V1.0.A");
    store.add_folder(4, "/Root/a.docx/Previews/V2.0.A");
    store.add_image(5, "/Root/a.docx/Previews/V2.0.A/preview9.png", 9);

    let report = harness
        .cleaner(config(CleanupMode::EmptyFoldersOnly, 1))
        .execute()
        .await
        .unwrap();

    assert_eq!(
        report.phases.iter().map(|p| p.phase).collect::<Vec<_>>(),
        vec![Phase::DeleteEmptyFolders]
    );
    assert_eq!(store.deleted_ids(), vec![3]);
    assert!(
        store
            .loads()
            .iter()
            .all(|q| q.kind == CandidateKind::EmptyFolders)
    );
}

#[tokio::test]
async fn test_failed_deletion_does_not_stop_the_run() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11, 12, 13]);
    harness.store.fail_deletes(11, u32::MAX);

    let report = harness
        .cleaner(config(CleanupMode::AllVersions, 0))
        .execute()
        .await
        .unwrap();

    let folders = report.phase(Phase::DeleteFolders).unwrap();
    assert_eq!(folders.deleted, 3);
    assert_eq!(folders.failed, 1);
    assert!(harness.store.contains(11));
    assert!(
        !harness
            .index
            .removed_paths()
            .iter()
            .any(|p| p.contains("doc11"))
    );
    assert!(!harness.listener.ids(DeletionKind::Folder).contains(&11));
}

#[tokio::test]
async fn test_index_failure_aborts_the_run() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11, 12, 13]);
    harness.index.fail_writes();

    let mut config = config(CleanupMode::AllVersions, 0);
    config.block_size = 2;

    let result = harness.cleaner(config).execute().await;

    assert!(matches!(result, Err(CleanupError::Index(_))));
    assert_eq!(harness.index.attempts(), 1);
    assert_eq!(harness.store.loads().len(), 1, "no page after the failure");
    assert_eq!(harness.store.deleted_ids(), vec![10, 11]);
}

#[tokio::test]
async fn test_unresolvable_types_fail_before_any_phase() {
    let store = Arc::new(InMemoryContentStore::without_types());
    let index = Arc::new(RecordingIndex::new());

    let result = PreviewCleaner::resolve(
        config(CleanupMode::AllVersions, 0),
        store.clone(),
        index.clone(),
    )
    .await;

    assert!(matches!(result, Err(CleanupError::Configuration(_))));
    assert!(store.loads().is_empty());
}

#[tokio::test]
async fn test_resolved_cleaner_runs() {
    let harness = Harness::new();
    add_content_with_previews(&harness.store, 1, "/Root/a.docx", "V1.0.A");

    let cleaner = PreviewCleaner::resolve(
        config(CleanupMode::AllVersions, 0),
        harness.store.clone(),
        harness.index.clone(),
    )
    .await
    .unwrap();
    cleaner.execute().await.unwrap();

    assert_eq!(harness.store.node_ids(), vec![1]);
}

#[tokio::test]
async fn test_exhausted_load_marks_phase_inconclusive() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11]);
    harness.store.fail_next_loads(3);

    let report = harness
        .cleaner(config(CleanupMode::AllVersions, 0))
        .execute()
        .await
        .unwrap();

    let folders = report.phase(Phase::DeleteFolders).unwrap();
    assert!(folders.inconclusive);
    assert_eq!(folders.deleted, 0);
    assert!(!report.is_conclusive());
    assert_eq!(report.metrics.load_exhaustions, 1);
    // the empty-folder sweep still ran and found the childless roots
    assert_eq!(report.phase(Phase::DeleteEmptyFolders).unwrap().deleted, 2);
}

#[tokio::test]
async fn test_exhausted_load_can_abort_the_run() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11]);
    harness.store.fail_next_loads(3);

    let mut config = config(CleanupMode::AllVersions, 0);
    config.fail_on_inconclusive_load = true;

    let result = harness.cleaner(config).execute().await;

    match result {
        Err(CleanupError::InconclusiveLoad { phase, after_id }) => {
            assert_eq!(phase, "delete_folders");
            assert_eq!(after_id, 0);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(harness.store.deleted_ids().is_empty());
}

#[tokio::test]
async fn test_dry_run_leaves_repository_and_index_untouched() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11]);

    let mut config = config(CleanupMode::AllVersions, 0);
    config.dry_run = true;

    let report = harness.cleaner(config).execute().await.unwrap();

    assert_eq!(report.phase(Phase::DeleteFolders).unwrap().dry_run, 2);
    assert_eq!(report.deleted(), 0);
    assert!(harness.store.deleted_ids().is_empty());
    assert!(harness.index.batches().is_empty());
    assert!(harness.listener.events().is_empty());
}

#[tokio::test]
async fn test_events_can_be_consumed_from_a_channel() {
    let harness = Harness::new();
    add_roots(&harness, "/Root", &[10, 11]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let cleaner = harness
        .cleaner(config(CleanupMode::AllVersions, 0))
        .with_listener(Arc::new(tx));
    cleaner.execute().await.unwrap();
    drop(cleaner);

    let mut ids = Vec::new();
    while let Some(event) = rx.recv().await {
        assert_eq!(event.kind, DeletionKind::Folder);
        ids.push(event.node_id);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 11]);
}

#[tokio::test]
async fn test_relative_scope_is_rejected() {
    let harness = Harness::new();
    let mut config = config(CleanupMode::AllVersions, 0);
    config.path = Some("Root/Sites".to_string());

    let result = harness.cleaner(config).execute().await;

    assert!(matches!(result, Err(CleanupError::Configuration(_))));
    assert!(harness.store.loads().is_empty());
}
