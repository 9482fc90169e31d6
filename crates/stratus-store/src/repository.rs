//! SQLite implementation of IFileRepository
//!
//! All owner-visible state lives in the single `files` relation; this module
//! turns the port contract into SQL. The interesting parts are the
//! transactional create (ancestor check + uniqueness re-check inside the
//! transaction, backstopped by the partial unique index) and the subtree
//! move, which rewrites descendant paths with a single LIKE-matched UPDATE
//! instead of per-row iteration.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use stratus_core::domain::{CoreError, FileRecord, FileStatus, NewFileRecord, VirtualPath};
use stratus_core::ports::{FilePatch, IFileRepository, NamespaceStats};

use crate::DatabasePool;

/// SQLite-backed namespace repository
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(db: &DatabasePool) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

fn db_err(e: sqlx::Error) -> CoreError {
    CoreError::Internal(format!("database error: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

/// Reconstructs a FileRecord from a `SELECT *` row.
fn record_from_row(row: &SqliteRow) -> Result<FileRecord, CoreError> {
    let path_str: String = row.get("path");
    let path = VirtualPath::new(path_str)
        .map_err(|e| CoreError::Internal(format!("stored path fails validation: {e}")))?;
    let status = FileStatus::from_i64(row.get("status"))?;

    Ok(FileRecord {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        path,
        is_dir: row.get::<i64, _>("is_dir") != 0,
        size: row.get("size"),
        url: row.get("url"),
        hash: row.get("hash"),
        version: row.get("version"),
        device_id: row.get("device_id"),
        last_modified_by: row.get("last_modified_by"),
        status,
        ctime: row.get("ctime"),
        utime: row.get("utime"),
    })
}

#[async_trait::async_trait]
impl IFileRepository for SqliteFileRepository {
    async fn create_file(&self, rec: &NewFileRecord) -> Result<FileRecord, CoreError> {
        rec.validate()?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The live directory ancestor must exist unless the parent is the
        // implicit root. Re-checked here, inside the transaction, so a
        // concurrent delete of the parent cannot slip between check and
        // insert.
        let parent = rec.path.parent();
        if !parent.is_root() {
            let parent_ok: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM files \
                 WHERE owner_id = ? AND path = ? AND is_dir = 1 AND status = 1)",
            )
            .bind(rec.owner_id)
            .bind(parent.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            if !parent_ok {
                return Err(CoreError::NotFound(format!(
                    "parent directory not found: {parent}"
                )));
            }
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM files \
             WHERE owner_id = ? AND path = ? AND status = 1)",
        )
        .bind(rec.owner_id)
        .bind(rec.path.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if taken {
            return Err(CoreError::Conflict(format!(
                "path already exists: {}",
                rec.path
            )));
        }

        let now = now_unix();
        let result = sqlx::query(
            "INSERT INTO files \
             (owner_id, name, path, is_dir, size, url, hash, device_id, \
              last_modified_by, status, ctime, utime) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(rec.owner_id)
        .bind(&rec.name)
        .bind(rec.path.as_str())
        .bind(rec.is_dir as i64)
        .bind(rec.size)
        .bind(&rec.url)
        .bind(&rec.hash)
        .bind(&rec.device_id)
        .bind(rec.owner_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CoreError::Conflict(format!("path already exists: {}", rec.path))
            } else {
                db_err(e)
            }
        })?;

        let id = result.last_insert_rowid();
        let row = sqlx::query("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        let record = record_from_row(&row)?;

        tx.commit().await.map_err(db_err)?;

        tracing::debug!(owner_id = rec.owner_id, path = %rec.path, id, "created namespace row");
        Ok(record)
    }

    async fn get_by_path(
        &self,
        owner_id: i64,
        path: &VirtualPath,
    ) -> Result<FileRecord, CoreError> {
        let row = sqlx::query("SELECT * FROM files WHERE owner_id = ? AND path = ? AND status = 1")
            .bind(owner_id)
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(ref r) => record_from_row(r),
            None => Err(CoreError::NotFound(format!("no entry at {path}"))),
        }
    }

    async fn get_by_id(&self, owner_id: i64, id: i64) -> Result<FileRecord, CoreError> {
        let row = sqlx::query("SELECT * FROM files WHERE id = ? AND owner_id = ? AND status = 1")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(ref r) => record_from_row(r),
            None => Err(CoreError::NotFound(format!("no entry with id {id}"))),
        }
    }

    async fn find_by_ids(&self, owner_id: i64, ids: &[i64]) -> Result<Vec<FileRecord>, CoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT * FROM files WHERE owner_id = ? AND status = 1 AND id IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(owner_id);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn list_children(
        &self,
        owner_id: i64,
        dir: &VirtualPath,
    ) -> Result<Vec<FileRecord>, CoreError> {
        // Direct children only: match descendants, anti-match grandchildren.
        let rows = sqlx::query(
            "SELECT * FROM files \
             WHERE owner_id = ? AND status = 1 \
               AND path LIKE ? AND path NOT LIKE ? \
             ORDER BY is_dir DESC, name ASC",
        )
        .bind(owner_id)
        .bind(dir.descendants_pattern())
        .bind(dir.grandchildren_pattern())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn path_exists(
        &self,
        owner_id: i64,
        path: &VirtualPath,
        must_be_dir: bool,
    ) -> Result<bool, CoreError> {
        if path.is_root() {
            return Ok(true);
        }

        let sql = if must_be_dir {
            "SELECT EXISTS(SELECT 1 FROM files \
             WHERE owner_id = ? AND path = ? AND status = 1 AND is_dir = 1)"
        } else {
            "SELECT EXISTS(SELECT 1 FROM files \
             WHERE owner_id = ? AND path = ? AND status = 1)"
        };

        sqlx::query_scalar(sql)
            .bind(owner_id)
            .bind(path.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn move_path(
        &self,
        owner_id: i64,
        old: &VirtualPath,
        new: &VirtualPath,
    ) -> Result<(), CoreError> {
        if old.is_root() || new.is_root() {
            return Err(CoreError::InvalidArgument(
                "cannot move the namespace root".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let source = sqlx::query(
            "SELECT * FROM files WHERE owner_id = ? AND path = ? AND status = 1",
        )
        .bind(owner_id)
        .bind(old.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let source = match source {
            Some(ref r) => record_from_row(r)?,
            None => return Err(CoreError::NotFound(format!("no entry at {old}"))),
        };

        if source.is_dir && new.is_inside(old) {
            return Err(CoreError::Conflict(format!(
                "cannot move directory {old} into its own subtree {new}"
            )));
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM files \
             WHERE owner_id = ? AND path = ? AND status = 1)",
        )
        .bind(owner_id)
        .bind(new.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if taken {
            return Err(CoreError::Conflict(format!("target path already exists: {new}")));
        }

        let new_parent = new.parent();
        if !new_parent.is_root() {
            let parent_ok: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM files \
                 WHERE owner_id = ? AND path = ? AND is_dir = 1 AND status = 1)",
            )
            .bind(owner_id)
            .bind(new_parent.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

            if !parent_ok {
                return Err(CoreError::NotFound(format!(
                    "target parent directory not found: {new_parent}"
                )));
            }
        }

        let now = now_unix();
        sqlx::query("UPDATE files SET path = ?, name = ?, utime = ? WHERE id = ?")
            .bind(new.as_str())
            .bind(new.name())
            .bind(now)
            .bind(source.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if source.is_dir {
            // Rewrite every live descendant in one statement: replace the
            // literal `old` prefix, keeping the remainder of each path.
            let rewritten = sqlx::query(
                "UPDATE files \
                 SET path = ? || substr(path, ?), utime = ? \
                 WHERE owner_id = ? AND status = 1 AND path LIKE ?",
            )
            .bind(new.as_str())
            .bind(old.as_str().len() as i64 + 1)
            .bind(now)
            .bind(owner_id)
            .bind(old.descendants_pattern())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            tracing::debug!(
                owner_id,
                old = %old,
                new = %new,
                descendants = rewritten.rows_affected(),
                "moved directory subtree"
            );
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn find_live_by_hash(
        &self,
        owner_id: i64,
        hash: &str,
    ) -> Result<Option<FileRecord>, CoreError> {
        if hash.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT * FROM files \
             WHERE owner_id = ? AND hash = ? AND is_dir = 0 AND status = 1 \
             ORDER BY ctime DESC LIMIT 1",
        )
        .bind(owner_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn has_other_references(
        &self,
        hash: &str,
        url: &str,
        exclude_id: i64,
    ) -> Result<bool, CoreError> {
        if hash.is_empty() {
            return Ok(false);
        }

        let rows = sqlx::query(
            "SELECT id, url FROM files \
             WHERE hash = ? AND is_dir = 0 AND status = 1 AND id != ?",
        )
        .bind(hash)
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        // Hash decides; a URL mismatch among same-hash rows only indicates
        // drift worth surfacing, never a deletion.
        for row in &rows {
            let other_url: String = row.get("url");
            if other_url != url {
                let other_id: i64 = row.get("id");
                tracing::warn!(
                    hash,
                    row_id = other_id,
                    expected_url = url,
                    actual_url = %other_url,
                    "rows sharing a hash reference different objects"
                );
            }
        }

        Ok(!rows.is_empty())
    }

    async fn soft_delete(&self, owner_id: i64, path: &VirtualPath) -> Result<(), CoreError> {
        let result = sqlx::query(
            "UPDATE files SET status = 0, utime = ? \
             WHERE owner_id = ? AND path = ? AND status = 1",
        )
        .bind(now_unix())
        .bind(owner_id)
        .bind(path.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("no entry at {path}")));
        }

        tracing::debug!(owner_id, path = %path, "soft-deleted namespace row");
        Ok(())
    }

    async fn update(
        &self,
        owner_id: i64,
        id: i64,
        patch: &FilePatch,
    ) -> Result<FileRecord, CoreError> {
        if patch.is_empty() {
            return self.get_by_id(owner_id, id).await;
        }

        let mut sets: Vec<&str> = Vec::new();
        if patch.name.is_some() {
            sets.push("name = ?");
        }
        if patch.size.is_some() {
            sets.push("size = ?");
        }
        if patch.url.is_some() {
            sets.push("url = ?");
        }
        if patch.hash.is_some() {
            sets.push("hash = ?");
        }
        if patch.device_id.is_some() {
            sets.push("device_id = ?");
        }

        let sql = format!(
            "UPDATE files SET {}, utime = ?, last_modified_by = ? \
             WHERE id = ? AND owner_id = ? AND status = 1",
            sets.join(", ")
        );

        // Bind order mirrors the set-clause order above.
        let mut query = sqlx::query(&sql);
        if let Some(ref name) = patch.name {
            query = query.bind(name);
        }
        if let Some(size) = patch.size {
            query = query.bind(size);
        }
        if let Some(ref url) = patch.url {
            query = query.bind(url);
        }
        if let Some(ref hash) = patch.hash {
            query = query.bind(hash);
        }
        if let Some(ref device_id) = patch.device_id {
            query = query.bind(device_id);
        }
        let result = query
            .bind(now_unix())
            .bind(owner_id.to_string())
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("no entry with id {id}")));
        }

        self.get_by_id(owner_id, id).await
    }

    async fn find_by_hash(
        &self,
        owner_id: i64,
        hash: &str,
    ) -> Result<Vec<FileRecord>, CoreError> {
        if hash.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT * FROM files \
             WHERE owner_id = ? AND hash = ? AND is_dir = 0 AND status = 1 \
             ORDER BY ctime DESC, id DESC",
        )
        .bind(owner_id)
        .bind(hash)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn stats(&self, owner_id: i64) -> Result<NamespaceStats, CoreError> {
        let row = sqlx::query(
            "SELECT \
               COALESCE(SUM(CASE WHEN is_dir = 0 THEN 1 ELSE 0 END), 0) AS total_files, \
               COALESCE(SUM(CASE WHEN is_dir = 1 THEN 1 ELSE 0 END), 0) AS total_folders, \
               COALESCE(SUM(CASE WHEN is_dir = 0 THEN size ELSE 0 END), 0) AS total_size \
             FROM files WHERE owner_id = ? AND status = 1",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(NamespaceStats {
            total_files: row.get("total_files"),
            total_folders: row.get("total_folders"),
            total_size: row.get("total_size"),
        })
    }
}
