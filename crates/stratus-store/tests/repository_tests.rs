//! Integration tests for SqliteFileRepository
//!
//! Exercises the IFileRepository contract against an in-memory SQLite
//! database: path invariants, subtree moves, dedup queries and soft-delete
//! reference counting. Each test creates a fresh database.

use stratus_core::domain::{CoreError, NewFileRecord, VirtualPath};
use stratus_core::ports::{FilePatch, IFileRepository};
use stratus_store::{DatabasePool, SqliteFileRepository};

// ============================================================================
// Test helpers
// ============================================================================

const OWNER: i64 = 42;

async fn setup() -> SqliteFileRepository {
    let pool = DatabasePool::in_memory()
        .await
        .expect("failed to create in-memory database");
    SqliteFileRepository::new(&pool)
}

fn vp(s: &str) -> VirtualPath {
    VirtualPath::new(s).unwrap()
}

fn new_file(owner: i64, path: &str, hash: &str, size: i64) -> NewFileRecord {
    let path = vp(path);
    NewFileRecord {
        owner_id: owner,
        name: path.name().to_string(),
        path,
        is_dir: false,
        size,
        url: if hash.is_empty() {
            String::new()
        } else {
            format!("cloud-file/{owner}/{hash}.bin")
        },
        hash: hash.to_string(),
        device_id: "test-device".to_string(),
    }
}

async fn mkdir(repo: &SqliteFileRepository, owner: i64, path: &str) {
    repo.create_file(&NewFileRecord::directory(owner, vp(path)))
        .await
        .unwrap();
}

// ============================================================================
// Create / lookup
// ============================================================================

#[tokio::test]
async fn test_create_and_get_file() {
    let repo = setup().await;

    let created = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();
    assert!(created.id > 0);
    assert_eq!(created.name, "a.bin");
    assert!(created.ctime > 0);
    assert_eq!(created.version, 1);

    let by_path = repo.get_by_path(OWNER, &vp("/a.bin")).await.unwrap();
    assert_eq!(by_path.id, created.id);

    let by_id = repo.get_by_id(OWNER, created.id).await.unwrap();
    assert_eq!(by_id.path.as_str(), "/a.bin");
}

#[tokio::test]
async fn test_lookups_are_owner_scoped() {
    let repo = setup().await;
    let created = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();

    assert!(matches!(
        repo.get_by_path(OWNER + 1, &vp("/a.bin")).await,
        Err(CoreError::NotFound(_))
    ));
    assert!(matches!(
        repo.get_by_id(OWNER + 1, created.id).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_requires_live_parent_directory() {
    let repo = setup().await;

    let err = repo
        .create_file(&new_file(OWNER, "/missing/a.bin", "h1", 10))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    mkdir(&repo, OWNER, "/docs").await;
    assert!(repo
        .create_file(&new_file(OWNER, "/docs/a.bin", "h1", 10))
        .await
        .is_ok());

    // a file at the parent path is not a directory ancestor
    let err = repo
        .create_file(&new_file(OWNER, "/docs/a.bin/x", "h2", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_create_rejects_taken_path() {
    let repo = setup().await;
    repo.create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();

    let err = repo
        .create_file(&new_file(OWNER, "/a.bin", "h2", 20))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn test_path_reusable_after_soft_delete() {
    let repo = setup().await;
    repo.create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();
    repo.soft_delete(OWNER, &vp("/a.bin")).await.unwrap();

    // the live-unique constraint no longer applies
    let recreated = repo
        .create_file(&new_file(OWNER, "/a.bin", "h2", 20))
        .await
        .unwrap();
    assert_eq!(recreated.hash, "h2");
}

#[tokio::test]
async fn test_find_by_ids_skips_missing_and_foreign() {
    let repo = setup().await;
    let a = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 1))
        .await
        .unwrap();
    let b = repo
        .create_file(&new_file(OWNER, "/b.bin", "h2", 2))
        .await
        .unwrap();
    let foreign = repo
        .create_file(&new_file(OWNER + 1, "/c.bin", "h3", 3))
        .await
        .unwrap();

    let found = repo
        .find_by_ids(OWNER, &[a.id, b.id, foreign.id, 9999])
        .await
        .unwrap();
    let mut ids: Vec<i64> = found.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![a.id, b.id]);

    assert!(repo.find_by_ids(OWNER, &[]).await.unwrap().is_empty());
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_children_order_and_depth() {
    let repo = setup().await;
    mkdir(&repo, OWNER, "/z-dir").await;
    mkdir(&repo, OWNER, "/a-dir").await;
    repo.create_file(&new_file(OWNER, "/b.txt", "h1", 1))
        .await
        .unwrap();
    repo.create_file(&new_file(OWNER, "/a.txt", "h2", 1))
        .await
        .unwrap();
    // grandchild must not appear in a root listing
    repo.create_file(&new_file(OWNER, "/a-dir/nested.txt", "h3", 1))
        .await
        .unwrap();

    let children = repo.list_children(OWNER, &VirtualPath::root()).await.unwrap();
    let names: Vec<&str> = children.iter().map(|r| r.name.as_str()).collect();
    // directories first, then by name ascending
    assert_eq!(names, vec!["a-dir", "z-dir", "a.txt", "b.txt"]);

    let sub = repo.list_children(OWNER, &vp("/a-dir")).await.unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].name, "nested.txt");
}

// ============================================================================
// Move
// ============================================================================

#[tokio::test]
async fn test_move_file() {
    let repo = setup().await;
    mkdir(&repo, OWNER, "/dst").await;
    repo.create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();

    repo.move_path(OWNER, &vp("/a.bin"), &vp("/dst/b.bin"))
        .await
        .unwrap();

    assert!(repo.get_by_path(OWNER, &vp("/a.bin")).await.is_err());
    let moved = repo.get_by_path(OWNER, &vp("/dst/b.bin")).await.unwrap();
    assert_eq!(moved.name, "b.bin");
    assert_eq!(moved.hash, "h1");
}

#[tokio::test]
async fn test_move_directory_rewrites_subtree() {
    let repo = setup().await;
    mkdir(&repo, OWNER, "/src").await;
    mkdir(&repo, OWNER, "/src/inner").await;
    repo.create_file(&new_file(OWNER, "/src/a.bin", "h1", 1))
        .await
        .unwrap();
    repo.create_file(&new_file(OWNER, "/src/inner/b.bin", "h2", 1))
        .await
        .unwrap();
    // sibling with a common string prefix must not move
    mkdir(&repo, OWNER, "/srcology").await;

    repo.move_path(OWNER, &vp("/src"), &vp("/dst")).await.unwrap();

    // no live row keeps the old prefix
    assert!(repo.get_by_path(OWNER, &vp("/src")).await.is_err());
    assert!(repo.get_by_path(OWNER, &vp("/src/a.bin")).await.is_err());

    assert!(repo.get_by_path(OWNER, &vp("/dst/a.bin")).await.is_ok());
    assert!(repo.get_by_path(OWNER, &vp("/dst/inner/b.bin")).await.is_ok());
    assert!(repo.get_by_path(OWNER, &vp("/srcology")).await.is_ok());

    // descendant count is preserved
    let children = repo.list_children(OWNER, &vp("/dst")).await.unwrap();
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn test_move_rejects_own_subtree_and_taken_target() {
    let repo = setup().await;
    mkdir(&repo, OWNER, "/a").await;
    mkdir(&repo, OWNER, "/a/b").await;
    mkdir(&repo, OWNER, "/c").await;

    let err = repo
        .move_path(OWNER, &vp("/a"), &vp("/a/b/a"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let err = repo.move_path(OWNER, &vp("/a"), &vp("/c")).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    let err = repo
        .move_path(OWNER, &vp("/a"), &vp("/nope/a"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = repo
        .move_path(OWNER, &vp("/ghost"), &vp("/g2"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

// ============================================================================
// Dedup and references
// ============================================================================

#[tokio::test]
async fn test_find_live_by_hash() {
    let repo = setup().await;
    assert!(repo.find_live_by_hash(OWNER, "h1").await.unwrap().is_none());
    assert!(repo.find_live_by_hash(OWNER, "").await.unwrap().is_none());

    let created = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();
    let hit = repo.find_live_by_hash(OWNER, "h1").await.unwrap().unwrap();
    assert_eq!(hit.id, created.id);

    // other owners never see the hash
    assert!(repo
        .find_live_by_hash(OWNER + 1, "h1")
        .await
        .unwrap()
        .is_none());

    repo.soft_delete(OWNER, &vp("/a.bin")).await.unwrap();
    assert!(repo.find_live_by_hash(OWNER, "h1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_has_other_references() {
    let repo = setup().await;
    let x = repo
        .create_file(&new_file(OWNER, "/x", "h1", 10))
        .await
        .unwrap();
    let y = repo
        .create_file(&new_file(OWNER, "/y", "h1", 10))
        .await
        .unwrap();

    // while /y lives, /x's content is still referenced
    assert!(repo
        .has_other_references(&x.hash, &x.url, x.id)
        .await
        .unwrap());

    repo.soft_delete(OWNER, &vp("/x")).await.unwrap();
    // /y is now the last reference
    assert!(!repo
        .has_other_references(&y.hash, &y.url, y.id)
        .await
        .unwrap());

    // empty hashes never count as references
    assert!(!repo.has_other_references("", "", 0).await.unwrap());
}

// ============================================================================
// Update / versions / stats
// ============================================================================

#[tokio::test]
async fn test_update_patch() {
    let repo = setup().await;
    let created = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();

    let patch = FilePatch {
        size: Some(99),
        hash: Some("h9".to_string()),
        ..Default::default()
    };
    let updated = repo.update(OWNER, created.id, &patch).await.unwrap();
    assert_eq!(updated.size, 99);
    assert_eq!(updated.hash, "h9");
    assert_eq!(updated.name, "a.bin");
    assert_eq!(updated.last_modified_by, OWNER.to_string());

    // empty patch is a no-op read
    let same = repo
        .update(OWNER, created.id, &FilePatch::default())
        .await
        .unwrap();
    assert_eq!(same.size, 99);

    let err = repo.update(OWNER, 9999, &patch).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_find_by_hash_newest_first() {
    let repo = setup().await;
    let a = repo
        .create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();
    let b = repo
        .create_file(&new_file(OWNER, "/b.bin", "h1", 10))
        .await
        .unwrap();
    repo.create_file(&new_file(OWNER, "/other.bin", "h2", 10))
        .await
        .unwrap();

    let versions = repo.find_by_hash(OWNER, "h1").await.unwrap();
    assert_eq!(versions.len(), 2);
    // same-second inserts fall back to id DESC, so newest row leads
    assert_eq!(versions[0].id, b.id);
    assert_eq!(versions[1].id, a.id);
}

#[tokio::test]
async fn test_stats() {
    let repo = setup().await;
    assert_eq!(repo.stats(OWNER).await.unwrap().total_files, 0);

    mkdir(&repo, OWNER, "/docs").await;
    repo.create_file(&new_file(OWNER, "/a.bin", "h1", 10))
        .await
        .unwrap();
    repo.create_file(&new_file(OWNER, "/docs/b.bin", "h2", 32))
        .await
        .unwrap();

    let stats = repo.stats(OWNER).await.unwrap();
    assert_eq!(stats.total_files, 2);
    assert_eq!(stats.total_folders, 1);
    assert_eq!(stats.total_size, 42);
}
