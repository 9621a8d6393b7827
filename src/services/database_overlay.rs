//! SQLite-backed overlay of user-edited artwork fields.
//!
//! The overlay is optional and best-effort: readers treat any failure as "no
//! row" (see `RecordAssembler`), writers surface failures to the admin caller.
//! Every call should be wrapped in [`bounded`] so a slow database never stalls
//! asset serving.

use crate::errors::{CatalogError, CatalogResult};
use crate::models::record::ArtworkRecordRow;
use sqlx::{
    SqlitePool,
    migrate::Migrator,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{future::Future, str::FromStr, sync::Arc, time::Duration};
use tracing::{debug, info};

/// Ordered, idempotent schema migrations embedded at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Timeout for overlay reads on the request path.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for overlay writes issued by admin operations.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(3);

const MAX_CONNECTIONS: u32 = 10;
const MIN_CONNECTIONS: u32 = 1;
const MAX_CONNECTION_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Run `fut`, failing with a backend error once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> CatalogResult<T>
where
    F: Future<Output = CatalogResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| CatalogError::Backend(format!("database call exceeded {limit:?}")))?
}

#[derive(Clone)]
pub struct OverlayStore {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl OverlayStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `url` with the service's
    /// pool limits.
    pub async fn connect(url: &str) -> CatalogResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Create parent directory if needed
        if let Some(parent) = options
            .get_filename()
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!("Created missing directory {:?}", parent);
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .min_connections(MIN_CONNECTIONS)
            .max_lifetime(MAX_CONNECTION_LIFETIME)
            .connect_with(options)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Apply pending migrations. Already-applied versions are skipped.
    pub async fn migrate(&self) -> CatalogResult<()> {
        MIGRATOR
            .run(&*self.db)
            .await
            .map_err(|err| CatalogError::Backend(format!("migration failed: {err}")))?;
        debug!("overlay schema is up to date");
        Ok(())
    }

    pub async fn ping(&self) -> CatalogResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }

    /// Fetch the overlay row for `id`, if any.
    pub async fn get(&self, id: &str) -> CatalogResult<Option<ArtworkRecordRow>> {
        let row = sqlx::query_as::<_, ArtworkRecordRow>(
            "SELECT id, title, painted_location, start_date, end_date, in_progress,
                    detalle, bitacora, primary_image
             FROM artworks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    /// Replace the whole row for `row.id`. There is no partial update: merge
    /// with [`OverlayStore::get`] first when only some fields change.
    ///
    /// Returns `Conflict` when another artwork already holds the title.
    pub async fn upsert(&self, row: &ArtworkRecordRow) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO artworks (
                id, title, painted_location, start_date, end_date, in_progress,
                detalle, bitacora, primary_image
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                painted_location = excluded.painted_location,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                in_progress = excluded.in_progress,
                detalle = excluded.detalle,
                bitacora = excluded.bitacora,
                primary_image = excluded.primary_image,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&row.id)
        .bind(&row.title)
        .bind(&row.painted_location)
        .bind(row.start_date)
        .bind(row.end_date)
        .bind(row.in_progress)
        .bind(&row.detalle)
        .bind(&row.bitacora)
        .bind(&row.primary_image)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(CatalogError::Conflict("Title already exists".into()))
            }
            Err(err) => Err(CatalogError::Sqlx(err)),
        }
    }

    /// True when no artwork other than `exclude_id` uses exactly `title`.
    /// Comparison is case-sensitive.
    pub async fn title_is_unique(&self, title: &str, exclude_id: &str) -> CatalogResult<bool> {
        if title.trim().is_empty() {
            return Err(CatalogError::validation("Title is required"));
        }
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM artworks WHERE title = ? AND id != ?",
        )
        .bind(title)
        .bind(exclude_id)
        .fetch_one(&*self.db)
        .await?;
        Ok(count == 0)
    }

    /// Location of the database file, for logs.
    pub fn describe(url: &str) -> String {
        SqliteConnectOptions::from_str(url)
            .map(|o| o.get_filename().display().to_string())
            .unwrap_or_else(|_| "<invalid url>".into())
    }

    #[cfg(test)]
    pub async fn in_memory() -> Self {
        // One long-lived connection: each in-memory connection is its own DB.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = Self::new(Arc::new(pool));
        store.migrate().await.unwrap();
        store
    }
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn get_returns_none_for_unknown_id() {
        let store = OverlayStore::in_memory().await;
        assert_eq!(store.get("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_replaces_the_whole_row() {
        let store = OverlayStore::in_memory().await;
        let mut row = ArtworkRecordRow {
            id: "sunset".into(),
            title: "Sunset".into(),
            painted_location: "Oaxaca".into(),
            start_date: NaiveDate::from_ymd_opt(2023, 4, 1),
            end_date: None,
            in_progress: true,
            detalle: "oil".into(),
            bitacora: "day one".into(),
            primary_image: "a.jpg".into(),
        };
        store.upsert(&row).await.unwrap();
        assert_eq!(store.get("sunset").await.unwrap(), Some(row.clone()));

        row = ArtworkRecordRow::titled("sunset", "Sunset II");
        store.upsert(&row).await.unwrap();
        let stored = store.get("sunset").await.unwrap().unwrap();
        assert_eq!(stored, row);
        assert!(stored.detalle.is_empty());
        assert_eq!(stored.start_date, None);
    }

    #[tokio::test]
    async fn title_uniqueness_is_exact_and_excludes_self() {
        let store = OverlayStore::in_memory().await;
        store
            .upsert(&ArtworkRecordRow::titled("a1", "Sunset"))
            .await
            .unwrap();

        assert!(!store.title_is_unique("Sunset", "").await.unwrap());
        assert!(store.title_is_unique("Sunset", "a1").await.unwrap());
        // Case-sensitive policy: a different case is a different title.
        assert!(store.title_is_unique("sunset", "").await.unwrap());
        assert!(matches!(
            store.title_is_unique("   ", "").await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_title_on_upsert_is_a_conflict() {
        let store = OverlayStore::in_memory().await;
        store
            .upsert(&ArtworkRecordRow::titled("a1", "Sunset"))
            .await
            .unwrap();
        let err = store
            .upsert(&ArtworkRecordRow::titled("a2", "Sunset"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));

        // Empty titles never collide.
        store.upsert(&ArtworkRecordRow::titled("b1", "")).await.unwrap();
        store.upsert(&ArtworkRecordRow::titled("b2", "")).await.unwrap();
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let store = OverlayStore::in_memory().await;
        store.migrate().await.unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn connect_creates_missing_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta/overlay.db");
        let url = format!("sqlite://{}", path.display());

        let store = OverlayStore::connect(&url).await.unwrap();
        store.migrate().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn bounded_times_out() {
        let result: CatalogResult<()> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CatalogError::Backend(_))));
    }
}
